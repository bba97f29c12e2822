//! Z80 CPU: architectural state and instruction stepping.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.
#![allow(clippy::cast_sign_loss)] // Sign-extended displacements feed wrapping adds.

mod execute;

use crate::host::Host;
use crate::registers::{IndexReg, Registers};

/// Z80 CPU.
///
/// The CPU does not own memory or ports. `step()` executes one instruction,
/// reporting every cycle to the [`Host`]; `handle_active_int()` lets the
/// host initiate a maskable interrupt while its ~INT line is active.
pub struct Z80 {
    /// Register file.
    pub regs: Registers,
    /// Index pair selected by a DD/FD prefix for the following opcode.
    pub iregp: IndexReg,
    /// EI retired last; interrupt acceptance stays blocked until the next
    /// instruction has executed.
    pub ei_delay: bool,
}

impl Z80 {
    /// Create a CPU in the power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            iregp: IndexReg::Hl,
            ei_delay: false,
        };
        cpu.reset();
        cpu
    }

    /// Apply ~RESET: AF and SP all-ones, everything else zeroed.
    pub fn reset(&mut self) {
        self.regs = Registers {
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.regs.set_af(0xFFFF);
        self.iregp = IndexReg::Hl;
        self.ei_delay = false;
    }

    /// Execute one instruction (or one halted NOP, or one prefix byte).
    pub fn step<H: Host>(&mut self, host: &mut H) {
        self.ei_delay = false;

        if self.regs.halted {
            // A halted CPU keeps running M1 cycles without advancing PC.
            self.inc_r();
            let _ = host.m1_fetch(self.regs.pc);
            return;
        }

        let opcode = self.fetch_m1(host);
        match opcode {
            0xDD => {
                self.iregp = IndexReg::Ix;
                return;
            }
            0xFD => {
                self.iregp = IndexReg::Iy;
                return;
            }
            0xCB => self.execute_cb(host),
            0xED => self.execute_ed(host),
            _ => self.execute_main(host, opcode),
        }
        self.iregp = IndexReg::Hl;
    }

    /// Attempt to initiate a maskable interrupt.
    ///
    /// Declines between a prefix and its opcode, in the instruction after
    /// EI, and while IFF1 is reset. On acceptance the CPU leaves HALT,
    /// clears both IFFs and dispatches per the interrupt mode: IM 0/1 take
    /// 13 ticks to RST 38, IM 2 takes 19 including the vector read from
    /// `(I << 8) | 0xFF`.
    pub fn handle_active_int<H: Host>(&mut self, host: &mut H) -> bool {
        if self.iregp != IndexReg::Hl {
            return false;
        }
        if self.ei_delay || !self.regs.iff1 {
            return false;
        }

        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.inc_r();
        host.tick(7);

        let ret = self.regs.pc;
        self.push16(host, ret);

        let target = match self.regs.im {
            2 => {
                let vector = (u16::from(self.regs.i) << 8) | 0x00FF;
                let lo = host.read(vector);
                let hi = host.read(vector.wrapping_add(1));
                u16::from_le_bytes([lo, hi])
            }
            // IM 0 sees 0xFF on an open data bus, which decodes as RST 38:
            // identical entry to IM 1.
            _ => 0x0038,
        };
        self.regs.wz = target;
        self.set_pc(host, target);
        true
    }

    // === Cycle helpers ===

    /// M1 fetch of the next opcode byte; advances PC and the R register.
    fn fetch_m1<H: Host>(&mut self, host: &mut H) -> u8 {
        let pc = self.regs.pc;
        let opcode = host.m1_fetch(pc);
        self.set_pc(host, pc.wrapping_add(1));
        self.inc_r();
        opcode
    }

    /// Read the immediate byte at PC.
    fn imm8<H: Host>(&mut self, host: &mut H) -> u8 {
        let pc = self.regs.pc;
        let value = host.read(pc);
        self.set_pc(host, pc.wrapping_add(1));
        value
    }

    /// Read the immediate little-endian word at PC.
    fn imm16<H: Host>(&mut self, host: &mut H) -> u16 {
        let lo = self.imm8(host);
        let hi = self.imm8(host);
        u16::from_le_bytes([lo, hi])
    }

    /// Assign PC and notify the host.
    fn set_pc<H: Host>(&mut self, host: &mut H, addr: u16) {
        self.regs.pc = addr;
        host.set_pc(addr);
    }

    /// Increment R, preserving bit 7.
    fn inc_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    /// Push a word, high byte first.
    fn push16<H: Host>(&mut self, host: &mut H, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        host.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        host.write(self.regs.sp, lo);
    }

    /// Pop a word.
    fn pop16<H: Host>(&mut self, host: &mut H) -> u16 {
        let lo = host.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = host.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    /// Value of the selected index pair (HL, IX or IY).
    fn index_value(&self) -> u16 {
        match self.iregp {
            IndexReg::Hl => self.regs.hl(),
            IndexReg::Ix => self.regs.ix,
            IndexReg::Iy => self.regs.iy,
        }
    }

    /// Store into the selected index pair.
    fn set_index_value(&mut self, value: u16) {
        match self.iregp {
            IndexReg::Hl => self.regs.set_hl(value),
            IndexReg::Ix => self.regs.ix = value,
            IndexReg::Iy => self.regs.iy = value,
        }
    }

    /// Effective address of a `(HL)` operand: HL directly, or index plus
    /// the displacement byte (3-tick read, then 5 address-calculation
    /// ticks against the displacement address).
    fn mem_operand_addr<H: Host>(&mut self, host: &mut H) -> u16 {
        match self.iregp {
            IndexReg::Hl => self.regs.hl(),
            _ => {
                let d = self.imm8(host);
                host.set_addr_bus(self.regs.pc.wrapping_sub(1));
                host.exec_extra(5);
                let addr = self.index_value().wrapping_add(i16::from(d as i8) as u16);
                self.regs.wz = addr;
                addr
            }
        }
    }

    /// 8-bit register by operand index, with H/L mapped onto the selected
    /// index pair (IXH/IXL under a DD prefix and so on).
    fn get_reg8(&self, idx: u8) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => (self.index_value() >> 8) as u8,
            5 => self.index_value() as u8,
            7 => self.regs.a,
            _ => unreachable!("operand 6 is a memory access"),
        }
    }

    /// Store into an 8-bit register by operand index, index-mapped.
    fn set_reg8(&mut self, idx: u8, value: u8) {
        match idx {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => {
                let v = (self.index_value() & 0x00FF) | (u16::from(value) << 8);
                self.set_index_value(v);
            }
            5 => {
                let v = (self.index_value() & 0xFF00) | u16::from(value);
                self.set_index_value(v);
            }
            7 => self.regs.a = value,
            _ => unreachable!("operand 6 is a memory access"),
        }
    }

    /// 8-bit register by operand index, never index-mapped. Instructions
    /// with an `(IX+d)` memory operand address the true H and L for their
    /// register side.
    fn get_plain_reg8(&self, idx: u8) -> u8 {
        match idx {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => unreachable!("operand 6 is a memory access"),
        }
    }

    /// Store into an 8-bit register by operand index, never index-mapped.
    fn set_plain_reg8(&mut self, idx: u8, value: u8) {
        match idx {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => unreachable!("operand 6 is a memory access"),
        }
    }

    /// Register pair by index for the main block: BC, DE, index pair, SP.
    fn get_rp(&self, idx: u8) -> u16 {
        match idx & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_value(),
            _ => self.regs.sp,
        }
    }

    /// Store into a register pair by index: BC, DE, index pair, SP.
    fn set_rp(&mut self, idx: u8, value: u16) {
        match idx & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_index_value(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition by index: NZ, Z, NC, C, PO, PE, P, M.
    fn condition(&self, cc: u8) -> bool {
        use crate::flags::{CF, PF, SF, ZF};
        match cc & 7 {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            3 => self.regs.f & CF != 0,
            4 => self.regs.f & PF == 0,
            5 => self.regs.f & PF != 0,
            6 => self.regs.f & SF == 0,
            _ => self.regs.f & SF != 0,
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}
