//! One-line Z80 disassembly for the execution trace.
//!
//! Decodes a single instruction from a byte window using the standard
//! x/y/z opcode grid. Output is a conventional mnemonic string; operand
//! bytes are rendered as `$xx`/`$xxxx` and relative targets as signed
//! displacements. This exists for trace readability, not for assembler
//! round-trips.

const R: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = [
    "ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP ",
];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

/// Disassemble the instruction at the start of `bytes` (at least four
/// bytes of lookahead are expected; the window a trace record carries is
/// always long enough).
#[must_use]
pub fn disassemble(bytes: &[u8]) -> String {
    match bytes.first().copied().unwrap_or(0) {
        0xDD => indexed(&bytes[1..], "IX"),
        0xFD => indexed(&bytes[1..], "IY"),
        0xCB => cb(bytes.get(1).copied().unwrap_or(0), None),
        0xED => ed(&bytes[1..]),
        op => main(op, &bytes[1..], None),
    }
}

fn imm8(bytes: &[u8], at: usize) -> String {
    format!("${:02X}", bytes.get(at).copied().unwrap_or(0))
}

fn imm16(bytes: &[u8], at: usize) -> String {
    let lo = bytes.get(at).copied().unwrap_or(0);
    let hi = bytes.get(at + 1).copied().unwrap_or(0);
    format!("${:04X}", u16::from_le_bytes([lo, hi]))
}

fn rel8(bytes: &[u8], at: usize) -> String {
    let d = bytes.get(at).copied().unwrap_or(0) as i8;
    format!("{:+}", i16::from(d) + 2)
}

/// Operand name with H/L/(HL) replaced for an active index prefix.
fn reg(z: u8, idx: Option<(&str, String)>) -> String {
    match (z, idx) {
        (6, Some((_, ref mem))) => mem.clone(),
        (4, Some((name, _))) => format!("{name}H"),
        (5, Some((name, _))) => format!("{name}L"),
        _ => R[usize::from(z)].to_string(),
    }
}

fn pair(p: u8, idx: Option<&str>) -> String {
    match (p, idx) {
        (2, Some(name)) => name.to_string(),
        _ => RP[usize::from(p)].to_string(),
    }
}

fn pair2(p: u8, idx: Option<&str>) -> String {
    match (p, idx) {
        (2, Some(name)) => name.to_string(),
        _ => RP2[usize::from(p)].to_string(),
    }
}

/// DD/FD-prefixed instruction: decode the rest with HL mapped to `name`.
fn indexed(bytes: &[u8], name: &str) -> String {
    match bytes.first().copied().unwrap_or(0) {
        0xDD | 0xFD | 0xED => "NOP*".to_string(),
        0xCB => {
            let d = bytes.get(1).copied().unwrap_or(0) as i8;
            let op = bytes.get(2).copied().unwrap_or(0);
            cb(op, Some(format!("({name}{d:+})")))
        }
        op => {
            let d = bytes.get(1).copied().unwrap_or(0) as i8;
            let rest = bytes.get(1..).unwrap_or(&[]);
            main(op, rest, Some((name, format!("({name}{d:+})"))))
        }
    }
}

#[allow(clippy::too_many_lines)]
fn main(op: u8, rest: &[u8], idx: Option<(&str, String)>) -> String {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let idx_name = idx.as_ref().map(|(name, _)| *name);

    match x {
        0 => match z {
            0 => match y {
                0 => "NOP".to_string(),
                1 => "EX AF,AF'".to_string(),
                2 => format!("DJNZ {}", rel8(rest, 0)),
                3 => format!("JR {}", rel8(rest, 0)),
                _ => format!("JR {},{}", CC[usize::from(y - 4)], rel8(rest, 0)),
            },
            1 => {
                if y & 1 == 0 {
                    format!("LD {},{}", pair(p, idx_name), imm16(rest, 0))
                } else {
                    format!(
                        "ADD {},{}",
                        pair(2, idx_name),
                        pair(p, idx_name)
                    )
                }
            }
            2 => match y {
                0 => "LD (BC),A".to_string(),
                1 => "LD A,(BC)".to_string(),
                2 => "LD (DE),A".to_string(),
                3 => "LD A,(DE)".to_string(),
                4 => format!("LD ({}),{}", imm16(rest, 0), pair(2, idx_name)),
                5 => format!("LD {},({})", pair(2, idx_name), imm16(rest, 0)),
                6 => format!("LD ({}),A", imm16(rest, 0)),
                _ => format!("LD A,({})", imm16(rest, 0)),
            },
            3 => {
                if y & 1 == 0 {
                    format!("INC {}", pair(p, idx_name))
                } else {
                    format!("DEC {}", pair(p, idx_name))
                }
            }
            4 => format!("INC {}", reg(y, idx)),
            5 => format!("DEC {}", reg(y, idx)),
            6 => {
                // LD (IX+d),n carries its displacement before the
                // immediate byte.
                let disp = usize::from(idx.is_some() && y == 6);
                format!("LD {},{}", reg(y, idx), imm8(rest, disp))
            }
            _ => ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"]
                [usize::from(y)]
            .to_string(),
        },
        1 => {
            if op == 0x76 {
                "HALT".to_string()
            } else if z == 6 || y == 6 {
                // The register side of an indexed memory move is unmapped.
                let mem = reg(6, idx);
                if z == 6 {
                    format!("LD {},{}", R[usize::from(y)], mem)
                } else {
                    format!("LD {},{}", mem, R[usize::from(z)])
                }
            } else {
                format!("LD {},{}", reg(y, idx.clone()), reg(z, idx))
            }
        }
        2 => format!("{}{}", ALU[usize::from(y)], reg(z, idx)),
        _ => match z {
            0 => format!("RET {}", CC[usize::from(y)]),
            1 => {
                if y & 1 == 0 {
                    format!("POP {}", pair2(p, idx_name))
                } else {
                    match p {
                        0 => "RET".to_string(),
                        1 => "EXX".to_string(),
                        2 => format!("JP ({})", idx_name.unwrap_or("HL")),
                        _ => format!("LD SP,{}", idx_name.unwrap_or("HL")),
                    }
                }
            }
            2 => format!("JP {},{}", CC[usize::from(y)], imm16(rest, 0)),
            3 => match y {
                0 => format!("JP {}", imm16(rest, 0)),
                2 => format!("OUT ({}),A", imm8(rest, 0)),
                3 => format!("IN A,({})", imm8(rest, 0)),
                4 => format!("EX (SP),{}", idx_name.unwrap_or("HL")),
                5 => "EX DE,HL".to_string(),
                6 => "DI".to_string(),
                _ => "EI".to_string(),
            },
            4 => format!("CALL {},{}", CC[usize::from(y)], imm16(rest, 0)),
            5 => {
                if y & 1 == 0 {
                    format!("PUSH {}", pair2(p, idx_name))
                } else {
                    format!("CALL {}", imm16(rest, 0))
                }
            }
            6 => format!("{}{}", ALU[usize::from(y)], imm8(rest, 0)),
            _ => format!("RST ${:02X}", op & 0x38),
        },
    }
}

fn cb(op: u8, mem: Option<String>) -> String {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let operand = mem.unwrap_or_else(|| R[usize::from(z)].to_string());
    match x {
        0 => format!("{} {operand}", ROT[usize::from(y)]),
        1 => format!("BIT {y},{operand}"),
        2 => format!("RES {y},{operand}"),
        _ => format!("SET {y},{operand}"),
    }
}

fn ed(bytes: &[u8]) -> String {
    let op = bytes.first().copied().unwrap_or(0);
    let y = (op >> 3) & 7;
    let p = y >> 1;
    match op {
        0x40..=0x7F => match op & 7 {
            0 => {
                if y == 6 {
                    "IN (C)".to_string()
                } else {
                    format!("IN {},(C)", R[usize::from(y)])
                }
            }
            1 => {
                if y == 6 {
                    "OUT (C),0".to_string()
                } else {
                    format!("OUT (C),{}", R[usize::from(y)])
                }
            }
            2 => {
                if y & 1 == 0 {
                    format!("SBC HL,{}", RP[usize::from(p)])
                } else {
                    format!("ADC HL,{}", RP[usize::from(p)])
                }
            }
            3 => {
                if y & 1 == 0 {
                    format!("LD ({}),{}", imm16(&bytes[1..], 0), RP[usize::from(p)])
                } else {
                    format!("LD {},({})", RP[usize::from(p)], imm16(&bytes[1..], 0))
                }
            }
            4 => "NEG".to_string(),
            5 => {
                if op == 0x4D {
                    "RETI".to_string()
                } else {
                    "RETN".to_string()
                }
            }
            6 => format!("IM {}", [0u8, 0, 1, 2][usize::from(y & 3)]),
            _ => match y {
                0 => "LD I,A".to_string(),
                1 => "LD R,A".to_string(),
                2 => "LD A,I".to_string(),
                3 => "LD A,R".to_string(),
                4 => "RRD".to_string(),
                5 => "RLD".to_string(),
                _ => "NOP*".to_string(),
            },
        },
        0xA0 => "LDI".to_string(),
        0xA1 => "CPI".to_string(),
        0xA2 => "INI".to_string(),
        0xA3 => "OUTI".to_string(),
        0xA8 => "LDD".to_string(),
        0xA9 => "CPD".to_string(),
        0xAA => "IND".to_string(),
        0xAB => "OUTD".to_string(),
        0xB0 => "LDIR".to_string(),
        0xB1 => "CPIR".to_string(),
        0xB2 => "INIR".to_string(),
        0xB3 => "OTIR".to_string(),
        0xB8 => "LDDR".to_string(),
        0xB9 => "CPDR".to_string(),
        0xBA => "INDR".to_string(),
        0xBB => "OTDR".to_string(),
        _ => "NOP*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprefixed() {
        assert_eq!(disassemble(&[0x00]), "NOP");
        assert_eq!(disassemble(&[0x3E, 0x42]), "LD A,$42");
        assert_eq!(disassemble(&[0xC3, 0x34, 0x12]), "JP $1234");
        assert_eq!(disassemble(&[0x76]), "HALT");
        assert_eq!(disassemble(&[0xD3, 0xFE]), "OUT ($FE),A");
        assert_eq!(disassemble(&[0x10, 0xFE]), "DJNZ +0");
        assert_eq!(disassemble(&[0x20, 0x05]), "JR NZ,+7");
        assert_eq!(disassemble(&[0x86]), "ADD A,(HL)");
        assert_eq!(disassemble(&[0xF5]), "PUSH AF");
        assert_eq!(disassemble(&[0xC7]), "RST $00");
        assert_eq!(disassemble(&[0x22, 0x00, 0x40]), "LD ($4000),HL");
    }

    #[test]
    fn cb_and_ed() {
        assert_eq!(disassemble(&[0xCB, 0xC7]), "SET 0,A");
        assert_eq!(disassemble(&[0xCB, 0x26]), "SLA (HL)");
        assert_eq!(disassemble(&[0xED, 0xB0]), "LDIR");
        assert_eq!(disassemble(&[0xED, 0x78]), "IN A,(C)");
        assert_eq!(disassemble(&[0xED, 0x46]), "IM 0");
        assert_eq!(disassemble(&[0xED, 0x5E]), "IM 2");
        assert_eq!(disassemble(&[0xED, 0x00]), "NOP*");
    }

    #[test]
    fn indexed() {
        assert_eq!(disassemble(&[0xDD, 0x21, 0x78, 0x56]), "LD IX,$5678");
        assert_eq!(disassemble(&[0xDD, 0x66, 0x01]), "LD H,(IX+1)");
        assert_eq!(disassemble(&[0xFD, 0x34, 0xFF]), "INC (IY-1)");
        assert_eq!(disassemble(&[0xDD, 0x26, 0x10]), "LD IXH,$10");
        assert_eq!(disassemble(&[0xDD, 0x36, 0x02, 0x07]), "LD (IX+2),$07");
        assert_eq!(disassemble(&[0xDD, 0xCB, 0x01, 0xF8]), "SET 7,(IX+1)");
        assert_eq!(disassemble(&[0xDD, 0xE9]), "JP (IX)");
    }
}
