//! Zilog Z80 CPU core.
//!
//! Each call to `step()` executes exactly one instruction, reporting every
//! machine cycle to the [`Host`] synchronously. The host accounts T-states,
//! applies wait states and services I/O; the CPU holds only architectural
//! state. Interrupts are initiated by the host through
//! [`Z80::handle_active_int`].

mod alu;
mod cpu;
mod flags;
mod host;
mod registers;

pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use host::Host;
pub use registers::{IndexReg, Registers};
