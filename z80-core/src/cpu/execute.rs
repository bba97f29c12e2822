//! Instruction execution for the Z80.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.
#![allow(clippy::cast_sign_loss)] // Sign-extended displacements feed wrapping adds.

use crate::alu;
use crate::flags::{sz53, sz53p, CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::host::Host;
use crate::registers::IndexReg;

use super::Z80;

impl Z80 {
    // =========================================================================
    // Unprefixed instructions
    // =========================================================================

    /// Execute an unprefixed instruction. CB/ED and the index prefixes are
    /// routed by `step()` before this is reached.
    pub(super) fn execute_main<H: Host>(&mut self, host: &mut H, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr, nn (01=BC, 11=DE, 21=HL/IX/IY, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.imm16(host);
                self.set_rp((op >> 4) & 3, value);
            }

            // LD (BC), A
            0x02 => {
                let addr = self.regs.bc();
                let a = self.regs.a;
                self.regs.wz =
                    (u16::from(a) << 8) | (addr.wrapping_add(1) & 0x00FF);
                host.write(addr, a);
            }

            // INC rr (03=BC, 13=DE, 23=HL/IX/IY, 33=SP)
            0x03 | 0x13 | 0x23 | 0x33 => {
                host.tick(2);
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_add(1);
                self.set_rp(rp, value);
            }

            // INC r (04=B, 0C=C, 14=D, 1C=E, 24=H, 2C=L, 34=(HL), 3C=A)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (op >> 3) & 7;
                let result = if r == 6 {
                    let addr = self.mem_operand_addr(host);
                    let value = host.read(addr);
                    host.read_extra(1);
                    let result = alu::inc8(value);
                    host.write(addr, result.value);
                    result
                } else {
                    let result = alu::inc8(self.get_reg8(r));
                    self.set_reg8(r, result.value);
                    result
                };
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // DEC r (05=B, 0D=C, 15=D, 1D=E, 25=H, 2D=L, 35=(HL), 3D=A)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (op >> 3) & 7;
                let result = if r == 6 {
                    let addr = self.mem_operand_addr(host);
                    let value = host.read(addr);
                    host.read_extra(1);
                    let result = alu::dec8(value);
                    host.write(addr, result.value);
                    result
                } else {
                    let result = alu::dec8(self.get_reg8(r));
                    self.set_reg8(r, result.value);
                    result
                };
                self.regs.f = (self.regs.f & CF) | result.flags;
            }

            // LD r, n (06=B, 0E=C, 16=D, 1E=E, 26=H, 2E=L, 3E=A)
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let r = (op >> 3) & 7;
                let value = self.imm8(host);
                self.set_reg8(r, value);
            }

            // LD (HL), n / LD (IX+d), n
            0x36 => {
                if self.iregp == IndexReg::Hl {
                    let value = self.imm8(host);
                    host.write(self.regs.hl(), value);
                } else {
                    // The displacement and immediate are both fetched
                    // before the address-calculation ticks.
                    let d = self.imm8(host);
                    let addr = self
                        .index_value()
                        .wrapping_add(i16::from(d as i8) as u16);
                    self.regs.wz = addr;
                    let value = self.imm8(host);
                    host.read_extra(2);
                    host.write(addr, value);
                }
            }

            // RLCA
            0x07 => {
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | carry;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | carry;
            }

            // EX AF, AF'
            0x08 => {
                core::mem::swap(&mut self.regs.a, &mut self.regs.a_alt);
                core::mem::swap(&mut self.regs.f, &mut self.regs.f_alt);
            }

            // ADD HL, rr (09=BC, 19=DE, 29=HL/IX/IY, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                host.tick(7);
                let lhs = self.index_value();
                let rhs = self.get_rp((op >> 4) & 3);
                self.regs.wz = lhs.wrapping_add(1);
                let (value, flags) = alu::add16(lhs, rhs);
                self.set_index_value(value);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | flags;
            }

            // LD A, (BC)
            0x0A => {
                let addr = self.regs.bc();
                self.regs.a = host.read(addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // DEC rr (0B=BC, 1B=DE, 2B=HL/IX/IY, 3B=SP)
            0x0B | 0x1B | 0x2B | 0x3B => {
                host.tick(2);
                let rp = (op >> 4) & 3;
                let value = self.get_rp(rp).wrapping_sub(1);
                self.set_rp(rp, value);
            }

            // RRCA
            0x0F => {
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (carry << 7);
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | carry;
            }

            // DJNZ e
            0x10 => {
                host.tick(1);
                let d = self.imm8(host);
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    host.exec_extra(5);
                    let target =
                        self.regs.pc.wrapping_add(i16::from(d as i8) as u16);
                    self.regs.wz = target;
                    self.set_pc(host, target);
                }
            }

            // LD (DE), A
            0x12 => {
                let addr = self.regs.de();
                let a = self.regs.a;
                self.regs.wz =
                    (u16::from(a) << 8) | (addr.wrapping_add(1) & 0x00FF);
                host.write(addr, a);
            }

            // RLA
            0x17 => {
                let old_carry = self.regs.f & CF;
                let new_carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | new_carry;
            }

            // JR e
            0x18 => {
                let d = self.imm8(host);
                host.exec_extra(5);
                let target = self.regs.pc.wrapping_add(i16::from(d as i8) as u16);
                self.regs.wz = target;
                self.set_pc(host, target);
            }

            // LD A, (DE)
            0x1A => {
                let addr = self.regs.de();
                self.regs.a = host.read(addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // RRA
            0x1F => {
                let old_carry = self.regs.f & CF;
                let new_carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (old_carry << 7);
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | new_carry;
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let d = self.imm8(host);
                if self.condition((op >> 3) & 3) {
                    host.exec_extra(5);
                    let target =
                        self.regs.pc.wrapping_add(i16::from(d as i8) as u16);
                    self.regs.wz = target;
                    self.set_pc(host, target);
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.imm16(host);
                let value = self.index_value();
                host.write(addr, value as u8);
                host.write(addr.wrapping_add(1), (value >> 8) as u8);
                self.regs.wz = addr.wrapping_add(1);
            }

            // DAA
            0x27 => {
                let result = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // LD HL, (nn)
            0x2A => {
                let addr = self.imm16(host);
                let lo = host.read(addr);
                let hi = host.read(addr.wrapping_add(1));
                self.set_index_value(u16::from_le_bytes([lo, hi]));
                self.regs.wz = addr.wrapping_add(1);
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (self.regs.a & (XF | YF));
            }

            // LD (nn), A
            0x32 => {
                let addr = self.imm16(host);
                let a = self.regs.a;
                self.regs.wz =
                    (u16::from(a) << 8) | (addr.wrapping_add(1) & 0x00FF);
                host.write(addr, a);
            }

            // SCF
            0x37 => {
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | CF;
            }

            // LD A, (nn)
            0x3A => {
                let addr = self.imm16(host);
                self.regs.a = host.read(addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // CCF
            0x3F => {
                let old_carry = self.regs.f & CF;
                self.regs.f = (self.regs.f & (SF | ZF | PF))
                    | (self.regs.a & (XF | YF))
                    | (if old_carry != 0 { HF } else { CF });
            }

            // HALT
            0x76 => {
                self.regs.halted = true;
            }

            // LD r, r' (40-7F except 76)
            0x40..=0x7F => {
                let dst = (op >> 3) & 7;
                let src = op & 7;
                if src == 6 {
                    // LD r, (HL) / LD r, (IX+d): the register side is the
                    // true H/L even under a prefix.
                    let addr = self.mem_operand_addr(host);
                    let value = host.read(addr);
                    self.set_plain_reg8(dst, value);
                } else if dst == 6 {
                    // LD (HL), r / LD (IX+d), r
                    let addr = self.mem_operand_addr(host);
                    let value = self.get_plain_reg8(src);
                    host.write(addr, value);
                } else {
                    let value = self.get_reg8(src);
                    self.set_reg8(dst, value);
                }
            }

            // ALU A, r (80-BF: ADD/ADC/SUB/SBC/AND/XOR/OR/CP)
            0x80..=0xBF => {
                let operand = if op & 7 == 6 {
                    let addr = self.mem_operand_addr(host);
                    host.read(addr)
                } else {
                    self.get_reg8(op & 7)
                };
                self.alu_acc((op >> 3) & 7, operand);
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                host.tick(1);
                if self.condition((op >> 3) & 7) {
                    let target = self.pop16(host);
                    self.regs.wz = target;
                    self.set_pc(host, target);
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL/IX/IY, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(host);
                self.set_rp2((op >> 4) & 3, value);
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.imm16(host);
                self.regs.wz = target;
                if self.condition((op >> 3) & 7) {
                    self.set_pc(host, target);
                }
            }

            // JP nn
            0xC3 => {
                let target = self.imm16(host);
                self.regs.wz = target;
                self.set_pc(host, target);
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.imm16(host);
                self.regs.wz = target;
                if self.condition((op >> 3) & 7) {
                    host.read_extra(1);
                    let ret = self.regs.pc;
                    self.push16(host, ret);
                    self.set_pc(host, target);
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL/IX/IY, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                host.tick(1);
                let value = self.get_rp2((op >> 4) & 3);
                self.push16(host, value);
            }

            // ALU A, n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let operand = self.imm8(host);
                self.alu_acc((op >> 3) & 7, operand);
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                host.tick(1);
                let ret = self.regs.pc;
                self.push16(host, ret);
                let target = u16::from(op & 0x38);
                self.regs.wz = target;
                self.set_pc(host, target);
            }

            // RET
            0xC9 => {
                let target = self.pop16(host);
                self.regs.wz = target;
                self.set_pc(host, target);
            }

            // CALL nn
            0xCD => {
                let target = self.imm16(host);
                self.regs.wz = target;
                host.read_extra(1);
                let ret = self.regs.pc;
                self.push16(host, ret);
                self.set_pc(host, target);
            }

            // OUT (n), A
            0xD3 => {
                let n = self.imm8(host);
                let a = self.regs.a;
                let port = (u16::from(a) << 8) | u16::from(n);
                self.regs.wz = (u16::from(a) << 8)
                    | (u16::from(n.wrapping_add(1)) & 0x00FF);
                host.output(port, a);
            }

            // EXX
            0xD9 => {
                core::mem::swap(&mut self.regs.b, &mut self.regs.b_alt);
                core::mem::swap(&mut self.regs.c, &mut self.regs.c_alt);
                core::mem::swap(&mut self.regs.d, &mut self.regs.d_alt);
                core::mem::swap(&mut self.regs.e, &mut self.regs.e_alt);
                core::mem::swap(&mut self.regs.h, &mut self.regs.h_alt);
                core::mem::swap(&mut self.regs.l, &mut self.regs.l_alt);
            }

            // IN A, (n)
            0xDB => {
                let n = self.imm8(host);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.a = host.input(port);
                self.regs.wz = port.wrapping_add(1);
            }

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let lo = host.read(sp);
                let hi = host.read(sp.wrapping_add(1));
                host.read_extra(1);
                let old = self.index_value();
                host.write(sp.wrapping_add(1), (old >> 8) as u8);
                host.write(sp, old as u8);
                host.write_extra_2t();
                let value = u16::from_le_bytes([lo, hi]);
                self.set_index_value(value);
                self.regs.wz = value;
            }

            // JP (HL)
            0xE9 => {
                let target = self.index_value();
                self.set_pc(host, target);
            }

            // EX DE, HL (never index-mapped)
            0xEB => {
                core::mem::swap(&mut self.regs.d, &mut self.regs.h);
                core::mem::swap(&mut self.regs.e, &mut self.regs.l);
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }

            // LD SP, HL
            0xF9 => {
                host.tick(2);
                self.regs.sp = self.index_value();
            }

            // EI
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                if host.disable_int_on_ei() {
                    self.ei_delay = true;
                }
            }

            // Prefixes are dispatched by step() and never reach here.
            0xCB | 0xDD | 0xED | 0xFD => unreachable!("prefix handled by step"),
        }
    }

    /// Apply an accumulator ALU operation (ADD/ADC/SUB/SBC/AND/XOR/OR/CP).
    fn alu_acc(&mut self, aluop: u8, operand: u8) {
        let carry = self.regs.f & CF != 0;
        let a = self.regs.a;
        let result = match aluop {
            0 => alu::add8(a, operand, false),
            1 => alu::add8(a, operand, carry),
            2 => alu::sub8(a, operand, false),
            3 => alu::sub8(a, operand, carry),
            4 => alu::and8(a, operand),
            5 => alu::xor8(a, operand),
            6 => alu::or8(a, operand),
            _ => {
                // CP: the result is discarded and X/Y come from the operand.
                let cmp = alu::sub8(a, operand, false);
                self.regs.f =
                    (cmp.flags & !(XF | YF)) | (operand & (XF | YF));
                return;
            }
        };
        self.regs.a = result.value;
        self.regs.f = result.flags;
    }

    /// Register pair by index for PUSH/POP: BC, DE, index pair, AF.
    fn get_rp2(&self, idx: u8) -> u16 {
        match idx & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_value(),
            _ => self.regs.af(),
        }
    }

    /// Store into a PUSH/POP register pair.
    fn set_rp2(&mut self, idx: u8, value: u16) {
        match idx & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_index_value(value),
            _ => self.regs.set_af(value),
        }
    }

    // =========================================================================
    // CB-prefixed instructions
    // =========================================================================

    /// Execute after a CB prefix. Under an index prefix the displacement
    /// byte precedes the final opcode, which is a plain 3-tick fetch with
    /// two trailing contended ticks, and every operation works on memory.
    pub(super) fn execute_cb<H: Host>(&mut self, host: &mut H) {
        if self.iregp == IndexReg::Hl {
            let op = self.fetch_m1(host);
            self.execute_cb_op(host, op);
        } else {
            let d = self.imm8(host);
            let addr = self
                .index_value()
                .wrapping_add(i16::from(d as i8) as u16);
            self.regs.wz = addr;
            let pc = self.regs.pc;
            let op = host.fetch(pc);
            self.set_pc(host, pc.wrapping_add(1));
            host.read_extra(2);
            self.execute_ddcb_op(host, op, addr);
        }
    }

    /// CB operation on a register or (HL).
    fn execute_cb_op<H: Host>(&mut self, host: &mut H, op: u8) {
        let group = op >> 6;
        let bit = (op >> 3) & 7;
        let operand = op & 7;

        if group == 1 {
            // BIT b, r / BIT b, (HL)
            let (value, xy) = if operand == 6 {
                let addr = self.regs.hl();
                let value = host.read(addr);
                host.read_extra(1);
                (value, (self.regs.wz >> 8) as u8)
            } else {
                let value = self.get_plain_reg8(operand);
                (value, value)
            };
            self.bit_flags(bit, value, xy);
            return;
        }

        if operand == 6 {
            let addr = self.regs.hl();
            let value = host.read(addr);
            host.read_extra(1);
            let result = self.cb_transform(group, bit, value);
            host.write(addr, result);
        } else {
            let value = self.get_plain_reg8(operand);
            let result = self.cb_transform(group, bit, value);
            self.set_plain_reg8(operand, result);
        }
    }

    /// DDCB/FDCB operation: always a memory access at `addr`; non-BIT
    /// results are also copied to the register operand (undocumented).
    fn execute_ddcb_op<H: Host>(&mut self, host: &mut H, op: u8, addr: u16) {
        let group = op >> 6;
        let bit = (op >> 3) & 7;
        let operand = op & 7;

        let value = host.read(addr);
        host.read_extra(1);

        if group == 1 {
            self.bit_flags(bit, value, (addr >> 8) as u8);
            return;
        }

        let result = self.cb_transform(group, bit, value);
        host.write(addr, result);
        if operand != 6 {
            self.set_plain_reg8(operand, result);
        }
    }

    /// Rotate/shift (group 0), RES (group 2) or SET (group 3).
    fn cb_transform(&mut self, group: u8, bit: u8, value: u8) -> u8 {
        match group {
            0 => {
                let carry = self.regs.f & CF != 0;
                let result = match bit {
                    0 => alu::rlc(value),
                    1 => alu::rrc(value),
                    2 => alu::rl(value, carry),
                    3 => alu::rr(value, carry),
                    4 => alu::sla(value),
                    5 => alu::sra(value),
                    6 => alu::sll(value),
                    _ => alu::srl(value),
                };
                self.regs.f = result.flags;
                result.value
            }
            2 => value & !(1 << bit),
            _ => value | (1 << bit),
        }
    }

    /// Flags for BIT b: Z/P from the tested bit, S only for bit 7, X/Y
    /// from `xy` (the operand for registers, the high byte of the
    /// effective address otherwise).
    fn bit_flags(&mut self, bit: u8, value: u8, xy: u8) {
        let tested = value & (1 << bit);
        let mut flags = (self.regs.f & CF) | HF | (xy & (XF | YF));
        if tested == 0 {
            flags |= ZF | PF;
        }
        if bit == 7 && tested != 0 {
            flags |= SF;
        }
        self.regs.f = flags;
    }

    // =========================================================================
    // ED-prefixed instructions
    // =========================================================================

    /// Fetch and execute the byte after an ED prefix. ED ignores any index
    /// prefix; undefined opcodes are two-M1 no-ops.
    pub(super) fn execute_ed<H: Host>(&mut self, host: &mut H) {
        let op = self.fetch_m1(host);
        match op {
            0x40..=0x7F => self.execute_ed_main(host, op),
            0xA0..=0xA3 | 0xA8..=0xAB | 0xB0..=0xB3 | 0xB8..=0xBB => {
                self.execute_ed_block(host, op);
            }
            // Undefined ED opcodes act as 8-tick NOPs.
            _ => {}
        }
    }

    fn execute_ed_main<H: Host>(&mut self, host: &mut H, op: u8) {
        let y = (op >> 3) & 7;
        match op & 7 {
            // IN r, (C); ED 70 is the undocumented flags-only IN (C)
            0 => {
                let port = self.regs.bc();
                let value = host.input(port);
                self.regs.wz = port.wrapping_add(1);
                self.regs.f = (self.regs.f & CF) | sz53p(value);
                if y != 6 {
                    self.set_plain_reg8(y, value);
                }
            }

            // OUT (C), r; ED 71 is the undocumented OUT (C), 0
            1 => {
                let port = self.regs.bc();
                let value = if y == 6 { 0 } else { self.get_plain_reg8(y) };
                self.regs.wz = port.wrapping_add(1);
                host.output(port, value);
            }

            // SBC HL, rr / ADC HL, rr
            2 => {
                host.tick(7);
                let hl = self.regs.hl();
                let rhs = self.get_ed_rp((op >> 4) & 3);
                self.regs.wz = hl.wrapping_add(1);
                let (value, flags) = if op & 0x08 != 0 {
                    alu::adc16(hl, rhs, self.regs.f & CF != 0)
                } else {
                    alu::sbc16(hl, rhs, self.regs.f & CF != 0)
                };
                self.regs.set_hl(value);
                self.regs.f = flags;
            }

            // LD (nn), rr / LD rr, (nn)
            3 => {
                let addr = self.imm16(host);
                let rp = (op >> 4) & 3;
                if op & 0x08 != 0 {
                    let lo = host.read(addr);
                    let hi = host.read(addr.wrapping_add(1));
                    self.set_ed_rp(rp, u16::from_le_bytes([lo, hi]));
                } else {
                    let value = self.get_ed_rp(rp);
                    host.write(addr, value as u8);
                    host.write(addr.wrapping_add(1), (value >> 8) as u8);
                }
                self.regs.wz = addr.wrapping_add(1);
            }

            // NEG (all eight encodings)
            4 => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.regs.f = result.flags;
            }

            // RETN / RETI: both restore IFF1 from IFF2
            5 => {
                self.regs.iff1 = self.regs.iff2;
                let target = self.pop16(host);
                self.regs.wz = target;
                self.set_pc(host, target);
            }

            // IM 0/1/2
            6 => {
                self.regs.im = match y & 3 {
                    0 | 1 => 0,
                    2 => 1,
                    _ => 2,
                };
            }

            // LD I,A / LD R,A / LD A,I / LD A,R / RRD / RLD / NOP
            _ => match y {
                0 => {
                    host.tick(1);
                    self.regs.i = self.regs.a;
                }
                1 => {
                    host.tick(1);
                    self.regs.r = self.regs.a;
                }
                2 => {
                    host.tick(1);
                    self.regs.a = self.regs.i;
                    self.ir_load_flags();
                }
                3 => {
                    host.tick(1);
                    self.regs.a = self.regs.r;
                    self.ir_load_flags();
                }
                4 => self.rrd_rld(host, false),
                5 => self.rrd_rld(host, true),
                _ => {}
            },
        }
    }

    /// Flags for LD A,I / LD A,R: P/V mirrors IFF2.
    fn ir_load_flags(&mut self) {
        let mut flags = (self.regs.f & CF) | sz53(self.regs.a);
        if self.regs.iff2 {
            flags |= PF;
        }
        self.regs.f = flags;
    }

    /// RRD/RLD nibble rotation through (HL).
    fn rrd_rld<H: Host>(&mut self, host: &mut H, left: bool) {
        let addr = self.regs.hl();
        let value = host.read(addr);
        host.exec_extra(4);
        let a = self.regs.a;
        let (new_value, new_a) = if left {
            ((value << 4) | (a & 0x0F), (a & 0xF0) | (value >> 4))
        } else {
            ((a << 4) | (value >> 4), (a & 0xF0) | (value & 0x0F))
        };
        host.write(addr, new_value);
        self.regs.a = new_a;
        self.regs.f = (self.regs.f & CF) | sz53p(new_a);
        self.regs.wz = addr.wrapping_add(1);
    }

    /// Register pair by index for ED instructions: BC, DE, HL, SP
    /// (the index prefix never applies).
    fn get_ed_rp(&self, idx: u8) -> u16 {
        match idx & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn set_ed_rp(&mut self, idx: u8, value: u16) {
        match idx & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    // =========================================================================
    // Block instructions
    // =========================================================================

    fn execute_ed_block<H: Host>(&mut self, host: &mut H, op: u8) {
        let backwards = op & 0x08 != 0;
        let repeat = op & 0x10 != 0;
        match op & 3 {
            0 => self.block_ld(host, backwards, repeat),
            1 => self.block_cp(host, backwards, repeat),
            2 => self.block_in(host, backwards, repeat),
            _ => self.block_out(host, backwards, repeat),
        }
    }

    /// LDI/LDD/LDIR/LDDR.
    fn block_ld<H: Host>(&mut self, host: &mut H, backwards: bool, repeat: bool) {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = host.read(hl);
        host.write(de, value);
        host.write_extra_2t();

        let delta = if backwards { 0xFFFFu16 } else { 1 };
        self.regs.set_hl(hl.wrapping_add(delta));
        self.regs.set_de(de.wrapping_add(delta));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let n = value.wrapping_add(self.regs.a);
        let mut flags = self.regs.f & (SF | ZF | CF);
        flags |= n & XF;
        flags |= (n & 0x02) << 4;
        if bc != 0 {
            flags |= PF;
        }
        self.regs.f = flags;

        if repeat && bc != 0 {
            host.set_addr_bus(de);
            host.exec_extra(5);
            self.restart_block(host);
        }
    }

    /// CPI/CPD/CPIR/CPDR.
    fn block_cp<H: Host>(&mut self, host: &mut H, backwards: bool, repeat: bool) {
        let hl = self.regs.hl();
        let value = host.read(hl);
        host.exec_extra(5);

        let delta = if backwards { 0xFFFFu16 } else { 1 };
        self.regs.set_hl(hl.wrapping_add(delta));
        self.regs.wz = self.regs.wz.wrapping_add(delta);
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let a = self.regs.a;
        let diff = a.wrapping_sub(value);
        let half = a & 0x0F < value & 0x0F;
        let n = diff.wrapping_sub(u8::from(half));
        let mut flags = (self.regs.f & CF) | NF | (sz53(diff) & (SF | ZF));
        if half {
            flags |= HF;
        }
        if bc != 0 {
            flags |= PF;
        }
        flags |= n & XF;
        flags |= (n & 0x02) << 4;
        self.regs.f = flags;

        if repeat && bc != 0 && diff != 0 {
            host.set_addr_bus(hl);
            host.exec_extra(5);
            self.restart_block(host);
        }
    }

    /// INI/IND/INIR/INDR.
    fn block_in<H: Host>(&mut self, host: &mut H, backwards: bool, repeat: bool) {
        host.tick(1);
        let port = self.regs.bc();
        let value = host.input(port);
        let delta = if backwards { 0xFFFFu16 } else { 1 };
        self.regs.wz = port.wrapping_add(delta);

        self.regs.b = self.regs.b.wrapping_sub(1);
        let hl = self.regs.hl();
        host.write(hl, value);
        self.regs.set_hl(hl.wrapping_add(delta));

        let k = u16::from(value)
            + u16::from(self.regs.c.wrapping_add(delta as u8));
        self.block_io_flags(value, k);

        if repeat && self.regs.b != 0 {
            host.set_addr_bus(hl);
            host.exec_extra(5);
            self.restart_block(host);
        }
    }

    /// OUTI/OUTD/OTIR/OTDR.
    fn block_out<H: Host>(&mut self, host: &mut H, backwards: bool, repeat: bool) {
        host.tick(1);
        let hl = self.regs.hl();
        let value = host.read(hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let port = self.regs.bc();
        host.output(port, value);

        let delta = if backwards { 0xFFFFu16 } else { 1 };
        self.regs.set_hl(hl.wrapping_add(delta));
        self.regs.wz = port.wrapping_add(delta);

        let k = u16::from(value) + u16::from(self.regs.l);
        self.block_io_flags(value, k);

        if repeat && self.regs.b != 0 {
            host.set_addr_bus(port);
            host.exec_extra(5);
            self.restart_block(host);
        }
    }

    /// The undocumented flag rule shared by the I/O block instructions.
    fn block_io_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.b;
        let mut flags = sz53(b);
        if value & 0x80 != 0 {
            flags |= NF;
        }
        if k > 0xFF {
            flags |= HF | CF;
        }
        if crate::flags::parity((k as u8 & 7) ^ b) {
            flags |= PF;
        }
        self.regs.f = flags;
    }

    /// Rewind PC over the two instruction bytes so the block op runs again.
    fn restart_block<H: Host>(&mut self, host: &mut H) {
        let target = self.regs.pc.wrapping_sub(2);
        self.set_pc(host, target);
        self.regs.wz = target.wrapping_add(1);
    }
}
