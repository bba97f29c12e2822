//! The packed machine-state image.
//!
//! A contiguous little-endian byte layout mirroring every CPU register and
//! the machine driver fields. Hosts read and patch this image directly
//! (snapshot install, replay bookkeeping, debugger displays); the machine
//! installs it into the CPU on entry to `run()`/`handle_active_int()` and
//! retrieves it on exit, so the image is always coherent at operation
//! boundaries.

use thiserror::Error;

/// Total image size in bytes.
pub const STATE_IMAGE_LEN: usize = 44;

// 16-bit register fields.
const BC: usize = 0;
const DE: usize = 2;
const HL: usize = 4;
const AF: usize = 6;
const IX: usize = 8;
const IY: usize = 10;
const ALT_BC: usize = 12;
const ALT_DE: usize = 14;
const ALT_HL: usize = 16;
const ALT_AF: usize = 18;
const PC: usize = 20;
const SP: usize = 22;
const IR: usize = 24;
const WZ: usize = 26;

// 8-bit processor fields.
const IFF1: usize = 28;
const IFF2: usize = 29;
const INT_MODE: usize = 30;
const IREGP_KIND: usize = 31;

// 32-bit machine fields.
const TICKS_SINCE_INT: usize = 32;
const FETCHES_TO_STOP: usize = 36;

// 8-bit machine flags.
const INT_SUPPRESSED: usize = 40;
const INT_AFTER_EI_ALLOWED: usize = 41;
const BORDER_COLOUR: usize = 42;
const TRACE_ENABLED: usize = 43;

/// Rejection of an image the machine cannot run from.
///
/// The machine refuses to run and leaves its own state untouched; the
/// host recovers by rewriting the offending field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateImageError {
    #[error("invalid interrupt mode {0} (must be 0, 1 or 2)")]
    InvalidIntMode(u8),
    #[error("invalid index register selector {0} (0=HL, 1=IX, 2=IY)")]
    InvalidIndexReg(u8),
    #[error("invalid border colour {0} (must be 0..=7)")]
    InvalidBorderColour(u8),
}

/// The packed state image.
pub struct StateImage {
    bytes: [u8; STATE_IMAGE_LEN],
}

macro_rules! field16 {
    ($get:ident, $set:ident, $offset:ident) => {
        #[must_use]
        pub fn $get(&self) -> u16 {
            self.get16($offset)
        }

        pub fn $set(&mut self, value: u16) {
            self.set16($offset, value);
        }
    };
}

macro_rules! field_flag {
    ($get:ident, $set:ident, $offset:ident) => {
        #[must_use]
        pub fn $get(&self) -> bool {
            self.bytes[$offset] != 0
        }

        pub fn $set(&mut self, value: bool) {
            self.bytes[$offset] = u8::from(value);
        }
    };
}

impl StateImage {
    /// Image of the power-on machine: everything zero but a white border.
    #[must_use]
    pub fn new() -> Self {
        let mut image = Self {
            bytes: [0; STATE_IMAGE_LEN],
        };
        image.set_border_colour(7);
        image
    }

    fn get16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    fn set16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn get32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        ])
    }

    fn set32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    field16!(bc, set_bc, BC);
    field16!(de, set_de, DE);
    field16!(hl, set_hl, HL);
    field16!(af, set_af, AF);
    field16!(ix, set_ix, IX);
    field16!(iy, set_iy, IY);
    field16!(alt_bc, set_alt_bc, ALT_BC);
    field16!(alt_de, set_alt_de, ALT_DE);
    field16!(alt_hl, set_alt_hl, ALT_HL);
    field16!(alt_af, set_alt_af, ALT_AF);
    field16!(pc, set_pc, PC);
    field16!(sp, set_sp, SP);
    field16!(ir, set_ir, IR);
    field16!(wz, set_wz, WZ);

    field_flag!(iff1, set_iff1, IFF1);
    field_flag!(iff2, set_iff2, IFF2);

    #[must_use]
    pub fn int_mode(&self) -> u8 {
        self.bytes[INT_MODE]
    }

    pub fn set_int_mode(&mut self, mode: u8) {
        self.bytes[INT_MODE] = mode;
    }

    /// 0 = HL, 1 = IX, 2 = IY.
    #[must_use]
    pub fn iregp_kind(&self) -> u8 {
        self.bytes[IREGP_KIND]
    }

    pub fn set_iregp_kind(&mut self, kind: u8) {
        self.bytes[IREGP_KIND] = kind;
    }

    #[must_use]
    pub fn ticks_since_int(&self) -> u32 {
        self.get32(TICKS_SINCE_INT)
    }

    pub fn set_ticks_since_int(&mut self, ticks: u32) {
        self.set32(TICKS_SINCE_INT, ticks);
    }

    #[must_use]
    pub fn fetches_to_stop(&self) -> u32 {
        self.get32(FETCHES_TO_STOP)
    }

    pub fn set_fetches_to_stop(&mut self, fetches: u32) {
        self.set32(FETCHES_TO_STOP, fetches);
    }

    field_flag!(int_suppressed, set_int_suppressed, INT_SUPPRESSED);
    field_flag!(
        int_after_ei_allowed,
        set_int_after_ei_allowed,
        INT_AFTER_EI_ALLOWED
    );

    #[must_use]
    pub fn border_colour(&self) -> u8 {
        self.bytes[BORDER_COLOUR]
    }

    pub fn set_border_colour(&mut self, colour: u8) {
        self.bytes[BORDER_COLOUR] = colour;
    }

    field_flag!(trace_enabled, set_trace_enabled, TRACE_ENABLED);

    /// The raw image.
    #[must_use]
    pub fn bytes(&self) -> &[u8; STATE_IMAGE_LEN] {
        &self.bytes
    }

    /// The raw image, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8; STATE_IMAGE_LEN] {
        &mut self.bytes
    }

    /// Check the enumerated fields are within their domains.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range field found.
    pub fn validate(&self) -> Result<(), StateImageError> {
        if self.int_mode() > 2 {
            return Err(StateImageError::InvalidIntMode(self.int_mode()));
        }
        if self.iregp_kind() > 2 {
            return Err(StateImageError::InvalidIndexReg(self.iregp_kind()));
        }
        if self.border_colour() > 7 {
            return Err(StateImageError::InvalidBorderColour(self.border_colour()));
        }
        Ok(())
    }
}

impl Default for StateImage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_are_packed_little_endian() {
        let mut image = StateImage::new();
        image.set_bc(0x1234);
        image.set_wz(0xABCD);
        image.set_ticks_since_int(0x0102_0304);
        image.set_trace_enabled(true);

        assert_eq!(image.bytes()[0], 0x34);
        assert_eq!(image.bytes()[1], 0x12);
        assert_eq!(image.bytes()[26], 0xCD);
        assert_eq!(image.bytes()[27], 0xAB);
        assert_eq!(&image.bytes()[32..36], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(image.bytes()[43], 1);
    }

    #[test]
    fn power_on_border_is_white() {
        let image = StateImage::new();
        assert_eq!(image.border_colour(), 7);
        assert!(image.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut image = StateImage::new();
        image.set_int_mode(3);
        assert_eq!(image.validate(), Err(StateImageError::InvalidIntMode(3)));
        image.set_int_mode(2);

        image.set_iregp_kind(5);
        assert_eq!(image.validate(), Err(StateImageError::InvalidIndexReg(5)));
        image.set_iregp_kind(1);

        image.set_border_colour(8);
        assert_eq!(
            image.validate(),
            Err(StateImageError::InvalidBorderColour(8))
        );
        image.set_border_colour(0);
        assert!(image.validate().is_ok());
    }

    #[test]
    fn raw_view_and_typed_accessors_agree() {
        let mut image = StateImage::new();
        image.bytes_mut()[20] = 0x00;
        image.bytes_mut()[21] = 0x80;
        assert_eq!(image.pc(), 0x8000);
    }
}
