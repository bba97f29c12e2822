//! Cycle-accurate ZX Spectrum 48K machine core.
//!
//! The machine couples a [`z80_core::Z80`] to the ULA: every CPU cycle is
//! accounted in T-states, memory and I/O accesses to the contended window
//! stall exactly as the ULA's beam position dictates, and the screen is
//! rendered in lock-step with those ticks so mid-frame border and attribute
//! changes land on the precise pixel. Hosts drive the machine through
//! [`Spectrum48`]: install state, call [`Spectrum48::run`], consume the
//! returned [`Events`], and read the screen, memory and port-write log
//! between runs.
//!
//! The graphical shell, file-format loaders and sound are deliberately not
//! here; they are hosts of this crate.

mod bus;
mod config;
mod disasm;
mod events;
mod marks;
mod memory;
mod portlog;
mod screen;
mod spectrum;
mod state;
mod trace;
mod ula;

pub use bus::{HookContext, HookError};
pub use config::{MachineConfig, MachineModel};
pub use disasm::disassemble;
pub use events::Events;
pub use marks::{AddressMarks, BREAKPOINT_MARK, VISITED_MARK};
pub use memory::{MemoryImage, ROM_SIZE};
pub use portlog::{PortWrite, PortWriteLog, PORT_LOG_CAPACITY};
pub use screen::{
    ScreenChunks, BORDER_WIDTH, BOTTOM_BORDER_HEIGHT, CHUNKS_PER_FRAME_LINE, FRAME_HEIGHT,
    FRAME_WIDTH, PIXELS_PER_CHUNK, SCREEN_HEIGHT, SCREEN_WIDTH, TOP_BORDER_HEIGHT,
};
pub use spectrum::Spectrum48;
pub use state::{StateImage, StateImageError, STATE_IMAGE_LEN};
pub use ula::{Ula, FLASH_FRAME_COUNT, TICKS_PER_ACTIVE_INT, TICKS_PER_FRAME, TICKS_PER_LINE};
