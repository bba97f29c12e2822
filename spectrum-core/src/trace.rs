//! Execution trace records.
//!
//! Gated by the `trace_enabled` flag of the state image and emitted
//! through the `log` facade at trace level; the host decides where the
//! records go. Each record carries PC, the register file, the eight
//! bytes at PC and, when no index prefix is pending, a disassembly of
//! the instruction about to execute.

use z80_core::{IndexReg, Z80};

use crate::bus::{HookError, SpectrumBus};
use crate::disasm;

/// Log the instruction about to execute.
pub(crate) fn instruction(cpu: &Z80, bus: &SpectrumBus) {
    let pc = cpu.regs.pc;
    let bytes: [u8; 8] =
        core::array::from_fn(|i| bus.memory.read(pc.wrapping_add(i as u16)));
    let window: Vec<String> =
        bytes.iter().map(|b| format!("{b:02X}")).collect();
    let regs = &cpu.regs;

    if cpu.iregp == IndexReg::Hl {
        log::trace!(
            target: "spectrum",
            "{pc:04X} [{}] AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} IR={:04X} WZ={:04X} t={} {}",
            window.join(" "),
            regs.af(),
            regs.bc(),
            regs.de(),
            regs.hl(),
            regs.ix,
            regs.iy,
            regs.sp,
            regs.ir(),
            regs.wz,
            bus.ticks_since_int,
            disasm::disassemble(&bytes),
        );
    } else {
        log::trace!(
            target: "spectrum",
            "{pc:04X} [{}] AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} IR={:04X} WZ={:04X} t={}",
            window.join(" "),
            regs.af(),
            regs.bc(),
            regs.de(),
            regs.hl(),
            regs.ix,
            regs.iy,
            regs.sp,
            regs.ir(),
            regs.wz,
            bus.ticks_since_int,
        );
    }
}

/// Log a hook failure alongside the stop it causes.
pub(crate) fn hook_failure(port: u16, error: &HookError) {
    log::debug!(target: "spectrum", "input hook failed on port {port:04X}: {error}");
}
