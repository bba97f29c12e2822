//! The machine interior: tick accounting, contention and I/O routing.
//!
//! `SpectrumBus` owns everything the CPU touches and implements the
//! per-cycle [`Host`] contract. Memory accesses to $4000-$7FFF stall by
//! the ULA's beam position; I/O cycles follow the four contention
//! sequences selected by the port page and the ULA select bit; writes
//! advance the renderer past the current tick before they land so every
//! screen and border effect is pixel-exact.

use z80_core::Host;

use crate::events::Events;
use crate::marks::{AddressMarks, BREAKPOINT_MARK};
use crate::memory::MemoryImage;
use crate::portlog::{PortWrite, PortWriteLog};
use crate::screen::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::trace;
use crate::ula::{Ula, PIXELS_PER_TICK, TICKS_PER_LINE};

/// First tick at which the ULA fetches screen data.
const CONTENTION_BASE: u32 = 14_336;

/// Ticks of each line during which the beam is in the drawable area.
const CONTENTION_LINE_TICKS: u32 = SCREEN_WIDTH / PIXELS_PER_TICK;

/// Value read from a port no handler claims: the floating ULA value with
/// bit 6 low ("no tape input").
const DEFAULT_INPUT: u8 = 0xBF;

/// Failure reported by a host I/O hook. The affected cycle samples the
/// default value and the machine stops so the host can inspect.
#[derive(Debug, thiserror::Error)]
#[error("I/O hook failed: {0}")]
pub struct HookError(pub String);

/// Handle passed to I/O hooks; lets the host interrupt the run loop.
#[derive(Debug, Default)]
pub struct HookContext {
    stop_requested: bool,
}

impl HookContext {
    /// Request a `MACHINE_STOPPED` exit at the next loop boundary.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }
}

pub(crate) type InputHook =
    Box<dyn FnMut(&mut HookContext, u16) -> Result<u8, HookError>>;
pub(crate) type OutputHook = Box<dyn FnMut(&mut HookContext, u16, u8)>;

/// Machine interior driven by the CPU through the [`Host`] trait.
pub(crate) struct SpectrumBus {
    pub memory: MemoryImage,
    pub marks: AddressMarks,
    pub port_log: PortWriteLog,
    pub ula: Ula,
    /// Ticks since the last ~INT active edge.
    pub ticks_since_int: u32,
    /// Countdown to a `TICKS_LIMIT_HIT` event; 0 disables.
    pub ticks_to_stop: u32,
    /// Countdown of M1 cycles to a `FETCHES_LIMIT_HIT` event; 0 disables.
    pub fetches_to_stop: u32,
    pub events: Events,
    pub border_colour: u8,
    pub int_suppressed: bool,
    pub int_after_ei_allowed: bool,
    pub trace_enabled: bool,
    /// Last value presented on the address bus; extra idle cycles
    /// contend against it.
    addr_bus: u16,
    input_hook: Option<InputHook>,
    output_hook: Option<OutputHook>,
}

impl SpectrumBus {
    pub fn new() -> Self {
        Self {
            memory: MemoryImage::new(),
            marks: AddressMarks::new(),
            port_log: PortWriteLog::new(),
            ula: Ula::new(),
            ticks_since_int: 0,
            ticks_to_stop: 0,
            fetches_to_stop: 0,
            events: Events::NONE,
            border_colour: 7,
            int_suppressed: false,
            int_after_ei_allowed: false,
            trace_enabled: false,
            addr_bus: 0,
            input_hook: None,
            output_hook: None,
        }
    }

    pub fn set_input_hook(&mut self, hook: Option<InputHook>) {
        self.input_hook = hook;
    }

    pub fn set_output_hook(&mut self, hook: Option<OutputHook>) {
        self.output_hook = hook;
    }

    /// Beam-position stall in ticks, regardless of the address on the bus.
    fn contention_delay(&self) -> u32 {
        if self.ticks_since_int < CONTENTION_BASE {
            return 0;
        }
        let offset = self.ticks_since_int - CONTENTION_BASE;
        if offset >= SCREEN_HEIGHT * TICKS_PER_LINE {
            return 0;
        }
        let line_tick = offset % TICKS_PER_LINE;
        if line_tick >= CONTENTION_LINE_TICKS {
            return 0;
        }
        let phase = line_tick % 8;
        if phase == 7 {
            0
        } else {
            6 - phase
        }
    }

    /// Stall a memory access to the contended page.
    fn memory_contention(&mut self, addr: u16) {
        if (0x4000..0x8000).contains(&addr) {
            let delay = self.contention_delay();
            if delay > 0 {
                self.tick(delay);
            }
        }
    }

    /// One contention check followed by `n` ticks of the I/O sequence.
    fn contend_tick(&mut self, n: u32) {
        let delay = self.contention_delay();
        self.tick(delay + n);
    }

    /// The four-row I/O contention table. The page selects the row; the
    /// per-step check is by beam position only, which is what separates
    /// an uncontended ULA access from the plain 4-tick case.
    fn port_contention(&mut self, port: u16) {
        let contended_page = (0x4000..0x8000).contains(&port);
        let ula_port = port & 1 == 0;
        match (contended_page, ula_port) {
            (true, true) => {
                self.contend_tick(1);
                self.contend_tick(3);
            }
            (true, false) => {
                for _ in 0..4 {
                    self.contend_tick(1);
                }
            }
            (false, true) => {
                self.tick(1);
                self.contend_tick(3);
            }
            (false, false) => {
                self.tick(4);
            }
        }
    }

    /// Advance the renderer past the current tick, so the effect of a
    /// write that follows lands on the next pixel and later.
    fn render_past_current_tick(&mut self) {
        let target = self.ticks_since_int.wrapping_add(1);
        self.ula
            .render_to(&self.memory, self.border_colour, target);
    }

    /// Complete the frame render.
    pub fn render_screen(&mut self) {
        self.ula
            .render_to(&self.memory, self.border_colour, u32::MAX);
    }
}

impl Host for SpectrumBus {
    fn tick(&mut self, n: u32) {
        self.ticks_since_int += n;
        if self.ticks_to_stop > 0 {
            if self.ticks_to_stop <= n {
                self.ticks_to_stop = 0;
                self.events.insert(Events::TICKS_LIMIT_HIT);
            } else {
                self.ticks_to_stop -= n;
            }
        }
    }

    fn m1_fetch(&mut self, addr: u16) -> u8 {
        self.addr_bus = addr;
        if self.fetches_to_stop > 0 {
            self.fetches_to_stop -= 1;
            if self.fetches_to_stop == 0 {
                self.events.insert(Events::FETCHES_LIMIT_HIT);
            }
        }
        self.memory_contention(addr);
        self.tick(4);
        self.memory.read(addr)
    }

    fn fetch(&mut self, addr: u16) -> u8 {
        self.addr_bus = addr;
        self.memory_contention(addr);
        self.tick(3);
        self.memory.read(addr)
    }

    fn read(&mut self, addr: u16) -> u8 {
        self.addr_bus = addr;
        self.memory_contention(addr);
        self.tick(3);
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.addr_bus = addr;
        self.memory_contention(addr);
        // The ULA must have consumed the old byte for every pixel up to
        // this tick before the write can become visible.
        self.render_past_current_tick();
        self.tick(3);
        self.memory.write(addr, value);
    }

    fn input(&mut self, port: u16) -> u8 {
        self.addr_bus = port;
        self.port_contention(port);

        let mut ctx = HookContext::default();
        let value = match self.input_hook.as_mut() {
            None => DEFAULT_INPUT,
            Some(hook) => match hook(&mut ctx, port) {
                Ok(value) => value,
                Err(error) => {
                    trace::hook_failure(port, &error);
                    self.events.insert(Events::MACHINE_STOPPED);
                    DEFAULT_INPUT
                }
            },
        };
        if ctx.stop_requested {
            self.events.insert(Events::MACHINE_STOPPED);
        }
        value
    }

    fn output(&mut self, port: u16, value: u8) {
        self.addr_bus = port;
        if port & 0x00FF == 0x00FE {
            self.render_past_current_tick();
            self.border_colour = value & 0x07;
        }
        self.port_log.push(PortWrite {
            addr: port,
            value,
            tick: self.ticks_since_int,
        });
        self.port_contention(port);

        let mut ctx = HookContext::default();
        if let Some(hook) = self.output_hook.as_mut() {
            hook(&mut ctx, port, value);
        }
        if ctx.stop_requested {
            self.events.insert(Events::MACHINE_STOPPED);
        }
    }

    fn set_addr_bus(&mut self, addr: u16) {
        self.addr_bus = addr;
    }

    fn read_extra(&mut self, n: u32) {
        for _ in 0..n {
            self.memory_contention(self.addr_bus);
            self.tick(1);
        }
    }

    fn write_extra_2t(&mut self) {
        self.read_extra(2);
    }

    fn exec_extra(&mut self, n: u32) {
        self.read_extra(n);
    }

    fn set_pc(&mut self, addr: u16) {
        if self.marks.is_marked(addr, BREAKPOINT_MARK) {
            self.events.insert(Events::BREAKPOINT_HIT);
        }
    }

    fn disable_int_on_ei(&mut self) -> bool {
        !self.int_after_ei_allowed
    }
}
