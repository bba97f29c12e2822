//! The per-cycle contract between the CPU and its machine.

/// Machine-side handler for every CPU cycle.
///
/// The CPU never touches memory, ports or the clock directly; it reports
/// each cycle here and lets the host account T-states, insert contention
/// delays and service the access. Base cycle costs the host must apply:
/// 4 ticks for [`m1_fetch`](Host::m1_fetch), 3 for
/// [`fetch`](Host::fetch)/[`read`](Host::read)/[`write`](Host::write), and
/// the full 4-tick I/O sequence for [`input`](Host::input)/
/// [`output`](Host::output). The `*_extra` cycles are idle ticks that some
/// instructions append to a memory cycle; they still present the last
/// address on the bus, so contending hosts stall them like accesses.
pub trait Host {
    /// Account `n` idle T-states.
    fn tick(&mut self, n: u32);

    /// M1 opcode fetch at `addr` (4 ticks). Prefix bytes are M1 cycles too.
    fn m1_fetch(&mut self, addr: u16) -> u8;

    /// Non-M1 opcode fetch at `addr` (3 ticks); used for the trailing
    /// opcode byte of DDCB/FDCB instructions.
    fn fetch(&mut self, addr: u16) -> u8;

    /// Memory read (3 ticks).
    fn read(&mut self, addr: u16) -> u8;

    /// Memory write (3 ticks).
    fn write(&mut self, addr: u16, value: u8);

    /// I/O read (4 ticks including port contention).
    fn input(&mut self, port: u16) -> u8;

    /// I/O write (4 ticks including port contention).
    fn output(&mut self, port: u16, value: u8);

    /// The CPU places `addr` on the address bus without starting an
    /// access; subsequent extra cycles contend against it.
    fn set_addr_bus(&mut self, _addr: u16) {}

    /// `n` (1 or 2) idle ticks appended to the preceding read cycle.
    fn read_extra(&mut self, n: u32) {
        self.tick(n);
    }

    /// Two idle ticks appended to the preceding write cycle.
    fn write_extra_2t(&mut self) {
        self.tick(2);
    }

    /// `n` (3, 4 or 5) idle execution ticks against the current bus address.
    fn exec_extra(&mut self, n: u32) {
        self.tick(n);
    }

    /// The CPU has written `addr` into PC. Fires for every assignment,
    /// including the increments of opcode and operand fetches.
    fn set_pc(&mut self, _addr: u16) {}

    /// Whether EI should block interrupt acceptance for the following
    /// instruction. Hosts replaying recordings return `false` so an
    /// interrupt can land immediately after EI.
    fn disable_int_on_ei(&mut self) -> bool {
        true
    }
}
