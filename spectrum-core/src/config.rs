//! Machine configuration.

/// Spectrum model selection.
///
/// Only the 48K is implemented; the enum is the seam where the 128K
/// family (with its $7FFD banking, which the 48K machine logs but
/// otherwise drops) will attach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MachineModel {
    #[default]
    Spectrum48K,
}

/// Construction-time machine configuration.
#[derive(Default)]
pub struct MachineConfig {
    pub model: MachineModel,
    /// ROM image to install below $4000, if any. Shorter images are
    /// installed from address 0; longer ones are truncated.
    pub rom: Option<Vec<u8>>,
}

impl MachineConfig {
    /// A 48K machine with no ROM installed (memory keeps its power-on
    /// fill; the host may install a ROM through the memory view later).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A 48K machine with the given ROM image.
    #[must_use]
    pub fn with_rom(rom: Vec<u8>) -> Self {
        Self {
            model: MachineModel::Spectrum48K,
            rom: Some(rom),
        }
    }
}
