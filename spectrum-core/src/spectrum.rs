//! The 48K machine driver.

use z80_core::{IndexReg, Z80};

use crate::bus::{HookContext, HookError, SpectrumBus};
use crate::config::{MachineConfig, MachineModel};
use crate::events::Events;
use crate::marks::{AddressMarks, BREAKPOINT_MARK, VISITED_MARK};
use crate::memory::{MemoryImage, ROM_SIZE};
use crate::portlog::PortWrite;
use crate::screen::ScreenChunks;
use crate::state::{StateImage, StateImageError};
use crate::trace;
use crate::ula::{Ula, FLASH_FRAME_COUNT, TICKS_PER_ACTIVE_INT, TICKS_PER_FRAME};

/// The coupled CPU/ULA machine.
///
/// All observable state lives here: the CPU registers (mirrored through
/// the packed [`StateImage`]), the 64 KiB memory, the address marks, the
/// per-frame port-write log and the screen buffer. `run()` executes
/// instructions until an [`Events`] bit is raised, keeping the renderer
/// and the contention model in lock-step with the CPU's tick count.
pub struct Spectrum48 {
    cpu: Z80,
    bus: SpectrumBus,
    state: StateImage,
    /// Completed frame count; drives the FLASH period.
    frame_count: u64,
    /// ROM image reinstalled after a reset, if the configuration had one.
    rom: Option<Vec<u8>>,
}

impl Spectrum48 {
    /// Build a machine from the configuration.
    #[must_use]
    pub fn new(config: &MachineConfig) -> Self {
        match config.model {
            MachineModel::Spectrum48K => {}
        }
        let mut machine = Self {
            cpu: Z80::new(),
            bus: SpectrumBus::new(),
            state: StateImage::new(),
            frame_count: 0,
            rom: config.rom.clone(),
        };
        machine.install_rom();
        machine.retrieve_state();
        machine
    }

    /// Return to the power-on state: fresh CPU registers, the
    /// deterministic memory fill (with the configured ROM reinstalled),
    /// cleared marks, logs, screen and counters. Hooks stay installed.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory.reset();
        self.install_rom();
        self.bus.marks = AddressMarks::new();
        self.bus.port_log.clear();
        self.bus.ula = Ula::new();
        self.bus.ticks_since_int = 0;
        self.bus.ticks_to_stop = 0;
        self.bus.fetches_to_stop = 0;
        self.bus.events = Events::NONE;
        self.bus.border_colour = 7;
        self.bus.int_suppressed = false;
        self.bus.int_after_ei_allowed = false;
        self.bus.trace_enabled = false;
        self.frame_count = 0;
        self.state = StateImage::new();
        self.retrieve_state();
    }

    fn install_rom(&mut self) {
        if let Some(rom) = &self.rom {
            let len = rom.len().min(ROM_SIZE);
            self.bus.memory.bytes_mut()[..len].copy_from_slice(&rom[..len]);
        }
    }

    /// Run until an event is signalled.
    ///
    /// Installs the state image, services the frame boundary, then steps
    /// the CPU. During the first 32 ticks of a frame the ~INT line is
    /// active and each instruction boundary offers the CPU an interrupt
    /// (the CPU samples the line on the last tick of the previous
    /// instruction, hence the one-tick grace below).
    ///
    /// # Errors
    ///
    /// [`StateImageError`] if the host left an out-of-range value in the
    /// state image; the machine does not run.
    pub fn run(&mut self) -> Result<Events, StateImageError> {
        self.install_state()?;
        self.bus.events = Events::NONE;

        if self.bus.ticks_since_int >= TICKS_PER_FRAME {
            self.start_frame();
        }

        while self.bus.events.is_empty() && self.bus.ticks_since_int < TICKS_PER_FRAME {
            if !self.bus.int_suppressed
                && self.bus.ticks_since_int < TICKS_PER_ACTIVE_INT + 1
            {
                self.cpu.handle_active_int(&mut self.bus);
            }
            if self.bus.trace_enabled {
                trace::instruction(&self.cpu, &self.bus);
            }
            self.bus.marks.mark(self.cpu.regs.pc, VISITED_MARK);
            self.cpu.step(&mut self.bus);
        }

        if self.bus.ticks_since_int >= TICKS_PER_FRAME {
            self.bus.events.insert(Events::END_OF_FRAME);
        }
        self.retrieve_state();
        Ok(self.bus.events)
    }

    /// Offer the CPU a maskable interrupt right now, regardless of the
    /// ~INT window. Returns whether the interrupt was initiated.
    ///
    /// # Errors
    ///
    /// [`StateImageError`] as for [`run`](Self::run).
    pub fn handle_active_int(&mut self) -> Result<bool, StateImageError> {
        self.install_state()?;
        let initiated = self.cpu.handle_active_int(&mut self.bus);
        self.retrieve_state();
        Ok(initiated)
    }

    /// Raise `MACHINE_STOPPED`. Intended for I/O hooks and host threads
    /// that own the machine between runs; the bit is cleared again when
    /// `run()` starts.
    pub fn stop(&mut self) {
        self.bus.events.insert(Events::MACHINE_STOPPED);
    }

    // === Frame sequencing ===

    fn start_frame(&mut self) {
        self.bus.ticks_since_int %= TICKS_PER_FRAME;
        self.bus.ula.start_frame();
        self.frame_count += 1;
        if self.frame_count % u64::from(FLASH_FRAME_COUNT) == 0 {
            self.bus.ula.toggle_flash();
        }
        self.bus.port_log.clear();
    }

    // === State image transfer ===

    fn install_state(&mut self) -> Result<(), StateImageError> {
        self.state.validate()?;
        let iregp = IndexReg::from_u8(self.state.iregp_kind())
            .ok_or(StateImageError::InvalidIndexReg(self.state.iregp_kind()))?;

        let state = &self.state;
        let regs = &mut self.cpu.regs;
        regs.set_bc(state.bc());
        regs.set_de(state.de());
        regs.set_hl(state.hl());
        regs.set_af(state.af());
        regs.ix = state.ix();
        regs.iy = state.iy();
        regs.set_bc_alt(state.alt_bc());
        regs.set_de_alt(state.alt_de());
        regs.set_hl_alt(state.alt_hl());
        regs.set_af_alt(state.alt_af());
        regs.pc = state.pc();
        regs.sp = state.sp();
        regs.set_ir(state.ir());
        regs.wz = state.wz();
        regs.iff1 = state.iff1();
        regs.iff2 = state.iff2();
        regs.im = state.int_mode();
        self.cpu.iregp = iregp;

        self.bus.ticks_since_int = state.ticks_since_int();
        self.bus.fetches_to_stop = state.fetches_to_stop();
        self.bus.int_suppressed = state.int_suppressed();
        self.bus.int_after_ei_allowed = state.int_after_ei_allowed();
        self.bus.border_colour = state.border_colour();
        self.bus.trace_enabled = state.trace_enabled();
        Ok(())
    }

    fn retrieve_state(&mut self) {
        let regs = &self.cpu.regs;
        self.state.set_bc(regs.bc());
        self.state.set_de(regs.de());
        self.state.set_hl(regs.hl());
        self.state.set_af(regs.af());
        self.state.set_ix(regs.ix);
        self.state.set_iy(regs.iy);
        self.state.set_alt_bc(regs.bc_alt());
        self.state.set_alt_de(regs.de_alt());
        self.state.set_alt_hl(regs.hl_alt());
        self.state.set_alt_af(regs.af_alt());
        self.state.set_pc(regs.pc);
        self.state.set_sp(regs.sp);
        self.state.set_ir(regs.ir());
        self.state.set_wz(regs.wz);
        self.state.set_iff1(regs.iff1);
        self.state.set_iff2(regs.iff2);
        self.state.set_int_mode(regs.im);
        self.state.set_iregp_kind(self.cpu.iregp.as_u8());

        self.state.set_ticks_since_int(self.bus.ticks_since_int);
        self.state.set_fetches_to_stop(self.bus.fetches_to_stop);
        self.state.set_int_suppressed(self.bus.int_suppressed);
        self.state
            .set_int_after_ei_allowed(self.bus.int_after_ei_allowed);
        self.state.set_border_colour(self.bus.border_colour);
        self.state.set_trace_enabled(self.bus.trace_enabled);
    }

    // === Host-facing views ===

    /// The packed state image.
    #[must_use]
    pub fn state(&self) -> &StateImage {
        &self.state
    }

    /// The packed state image, writable. Takes effect at the next
    /// `run()`/`handle_active_int()`.
    pub fn state_mut(&mut self) -> &mut StateImage {
        &mut self.state
    }

    /// The memory image.
    #[must_use]
    pub fn memory(&self) -> &MemoryImage {
        &self.bus.memory
    }

    /// The memory image, writable (host raw view; no ROM protection).
    pub fn memory_mut(&mut self) -> &mut MemoryImage {
        &mut self.bus.memory
    }

    /// The address marks.
    #[must_use]
    pub fn marks(&self) -> &AddressMarks {
        &self.bus.marks
    }

    /// Set marks over a range of addresses.
    pub fn mark_addrs(&mut self, addr: u16, len: usize, marks: u8) {
        self.bus.marks.mark_range(addr, len, marks);
    }

    /// Arm breakpoints over a range.
    pub fn set_breakpoints(&mut self, addr: u16, len: usize) {
        self.mark_addrs(addr, len, BREAKPOINT_MARK);
    }

    /// Arm one breakpoint.
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.set_breakpoints(addr, 1);
    }

    /// Disarm breakpoints over a range.
    pub fn clear_breakpoints(&mut self, addr: u16, len: usize) {
        self.bus.marks.unmark_range(addr, len, BREAKPOINT_MARK);
    }

    /// Install the input hook consulted for every IN cycle.
    pub fn set_input_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut HookContext, u16) -> Result<u8, HookError> + 'static,
    {
        self.bus.set_input_hook(Some(Box::new(hook)));
    }

    /// Remove the input hook; IN cycles sample the default value.
    pub fn clear_input_hook(&mut self) {
        self.bus.set_input_hook(None);
    }

    /// Install the output hook invoked after every OUT cycle.
    pub fn set_output_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut HookContext, u16, u8) + 'static,
    {
        self.bus.set_output_hook(Some(Box::new(hook)));
    }

    /// Remove the output hook.
    pub fn clear_output_hook(&mut self) {
        self.bus.set_output_hook(None);
    }

    /// Stop after this many further ticks (0 disables the limit).
    pub fn set_ticks_limit(&mut self, ticks: u32) {
        self.bus.ticks_to_stop = ticks;
    }

    /// Stop after this many further M1 fetches (0 disables the limit).
    /// The counter lives in the state image.
    pub fn set_fetches_limit(&mut self, fetches: u32) {
        self.state.set_fetches_to_stop(fetches);
    }

    /// Complete the current frame's rendering and return the chunk
    /// buffer.
    pub fn render_screen(&mut self) -> &ScreenChunks {
        self.bus.render_screen();
        self.bus.ula.screen()
    }

    /// The chunk buffer as rendered so far.
    #[must_use]
    pub fn screen(&self) -> &ScreenChunks {
        self.bus.ula.screen()
    }

    /// Complete the frame render and expand it to packed RGB pixels.
    pub fn frame_pixels(&mut self) -> Vec<u32> {
        self.render_screen().to_rgb()
    }

    /// The current frame's port writes, in tick order.
    #[must_use]
    pub fn port_writes(&self) -> &[PortWrite] {
        self.bus.port_log.records()
    }

    /// Completed frames since construction.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Spectrum48 {
    fn default() -> Self {
        Self::new(&MachineConfig::new())
    }
}
