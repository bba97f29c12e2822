//! Data-driven single-instruction tests.
//!
//! Each case describes an initial CPU/RAM state, the expected final state
//! and the T-state cost of the instruction, in the JSON record format used
//! by the common Z80 single-step suites. The vectors here are embedded so
//! the suite needs no external data files.

use serde::Deserialize;
use std::collections::HashMap;
use z80_core::{Host, IndexReg, Registers, Z80};

/// Flat 64KB RAM host with preloaded port reads and a port-write log.
struct TestHost {
    ram: Vec<u8>,
    ticks: u32,
    io_read_values: HashMap<u16, u8>,
    io_writes: Vec<(u16, u8)>,
}

impl TestHost {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
            ticks: 0,
            io_read_values: HashMap::new(),
            io_writes: Vec::new(),
        }
    }
}

impl Host for TestHost {
    fn tick(&mut self, n: u32) {
        self.ticks += n;
    }

    fn m1_fetch(&mut self, addr: u16) -> u8 {
        self.tick(4);
        self.ram[usize::from(addr)]
    }

    fn fetch(&mut self, addr: u16) -> u8 {
        self.tick(3);
        self.ram[usize::from(addr)]
    }

    fn read(&mut self, addr: u16) -> u8 {
        self.tick(3);
        self.ram[usize::from(addr)]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.tick(3);
        self.ram[usize::from(addr)] = value;
    }

    fn input(&mut self, port: u16) -> u8 {
        self.tick(4);
        self.io_read_values.get(&port).copied().unwrap_or(0xFF)
    }

    fn output(&mut self, port: u16, value: u8) {
        self.tick(4);
        self.io_writes.push((port, value));
    }
}

/// JSON test case format.
#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: u32,
    #[serde(default)]
    ports: Vec<(u16, u8, String)>,
}

/// JSON CPU state; unlisted fields default to zero.
#[derive(Deserialize, Default)]
#[serde(default)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    wz: u16,
    af_: u16,
    bc_: u16,
    de_: u16,
    hl_: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    halted: u8,
    ram: Vec<(u16, u8)>,
}

fn setup(cpu: &mut Z80, host: &mut TestHost, state: &CpuState, ports: &[(u16, u8, String)]) {
    for &(addr, value) in &state.ram {
        host.ram[usize::from(addr)] = value;
    }
    for &(port, value, ref dir) in ports {
        if dir == "r" {
            host.io_read_values.insert(port, value);
        }
    }

    cpu.regs = Registers::default();
    cpu.regs.a = state.a;
    cpu.regs.f = state.f;
    cpu.regs.b = state.b;
    cpu.regs.c = state.c;
    cpu.regs.d = state.d;
    cpu.regs.e = state.e;
    cpu.regs.h = state.h;
    cpu.regs.l = state.l;
    cpu.regs.set_af_alt(state.af_);
    cpu.regs.set_bc_alt(state.bc_);
    cpu.regs.set_de_alt(state.de_);
    cpu.regs.set_hl_alt(state.hl_);
    cpu.regs.ix = state.ix;
    cpu.regs.iy = state.iy;
    cpu.regs.sp = state.sp;
    cpu.regs.pc = state.pc;
    cpu.regs.i = state.i;
    cpu.regs.r = state.r;
    cpu.regs.wz = state.wz;
    cpu.regs.iff1 = state.iff1 != 0;
    cpu.regs.iff2 = state.iff2 != 0;
    cpu.regs.im = state.im;
    cpu.regs.halted = state.halted != 0;
}

fn compare(cpu: &Z80, host: &TestHost, expected: &CpuState) -> Vec<String> {
    let mut errors = Vec::new();

    check(&mut errors, "A", u16::from(cpu.regs.a), u16::from(expected.a));
    check(&mut errors, "F", u16::from(cpu.regs.f), u16::from(expected.f));
    check(&mut errors, "B", u16::from(cpu.regs.b), u16::from(expected.b));
    check(&mut errors, "C", u16::from(cpu.regs.c), u16::from(expected.c));
    check(&mut errors, "D", u16::from(cpu.regs.d), u16::from(expected.d));
    check(&mut errors, "E", u16::from(cpu.regs.e), u16::from(expected.e));
    check(&mut errors, "H", u16::from(cpu.regs.h), u16::from(expected.h));
    check(&mut errors, "L", u16::from(cpu.regs.l), u16::from(expected.l));
    check(&mut errors, "AF'", cpu.regs.af_alt(), expected.af_);
    check(&mut errors, "BC'", cpu.regs.bc_alt(), expected.bc_);
    check(&mut errors, "DE'", cpu.regs.de_alt(), expected.de_);
    check(&mut errors, "HL'", cpu.regs.hl_alt(), expected.hl_);
    check(&mut errors, "IX", cpu.regs.ix, expected.ix);
    check(&mut errors, "IY", cpu.regs.iy, expected.iy);
    check(&mut errors, "SP", cpu.regs.sp, expected.sp);
    check(&mut errors, "PC", cpu.regs.pc, expected.pc);
    check(&mut errors, "I", u16::from(cpu.regs.i), u16::from(expected.i));
    check(&mut errors, "R", u16::from(cpu.regs.r), u16::from(expected.r));
    check(&mut errors, "WZ", cpu.regs.wz, expected.wz);
    check(
        &mut errors,
        "IFF1",
        u16::from(cpu.regs.iff1),
        u16::from(expected.iff1),
    );
    check(
        &mut errors,
        "IFF2",
        u16::from(cpu.regs.iff2),
        u16::from(expected.iff2),
    );
    check(&mut errors, "IM", u16::from(cpu.regs.im), u16::from(expected.im));
    check(
        &mut errors,
        "HALT",
        u16::from(cpu.regs.halted),
        u16::from(expected.halted),
    );

    for &(addr, value) in &expected.ram {
        let actual = host.ram[usize::from(addr)];
        if actual != value {
            errors.push(format!(
                "RAM[${addr:04X}]: got ${actual:02X}, want ${value:02X}"
            ));
        }
    }

    errors
}

fn check(errors: &mut Vec<String>, name: &str, actual: u16, expected: u16) {
    if actual != expected {
        errors.push(format!("{name}: got ${actual:04X}, want ${expected:04X}"));
    }
}

#[test]
fn embedded_vectors() {
    let tests: Vec<TestCase> =
        serde_json::from_str(VECTORS).expect("embedded vectors must parse");

    let mut failures = Vec::new();
    for test in &tests {
        let mut cpu = Z80::new();
        let mut host = TestHost::new();
        setup(&mut cpu, &mut host, &test.initial, &test.ports);

        // Step through one whole instruction, prefixes included.
        cpu.step(&mut host);
        while cpu.iregp != IndexReg::Hl {
            cpu.step(&mut host);
        }

        let mut errors = compare(&cpu, &host, &test.final_state);
        if host.ticks != test.cycles {
            errors.push(format!(
                "cycles: got {}, want {}",
                host.ticks, test.cycles
            ));
        }
        for &(port, value, ref dir) in &test.ports {
            if dir == "w" && !host.io_writes.contains(&(port, value)) {
                errors.push(format!("missing port write (${port:04X}, ${value:02X})"));
            }
        }

        if !errors.is_empty() {
            failures.push(format!("[{}]: {}", test.name, errors.join(", ")));
        }
    }

    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

const VECTORS: &str = r#"[
  {
    "name": "00: nop",
    "initial": { "ram": [[0, 0]] },
    "final": { "pc": 1, "r": 1 },
    "cycles": 4
  },
  {
    "name": "3e 42: ld a,n",
    "initial": { "ram": [[0, 62], [1, 66]] },
    "final": { "a": 66, "pc": 2, "r": 1, "ram": [[0, 62], [1, 66]] },
    "cycles": 7
  },
  {
    "name": "04: inc b wraps to zero",
    "initial": { "b": 255, "ram": [[0, 4]] },
    "final": { "b": 0, "f": 80, "pc": 1, "r": 1 },
    "cycles": 4
  },
  {
    "name": "c3 34 12: jp nn",
    "initial": { "ram": [[0, 195], [1, 52], [2, 18]] },
    "final": { "pc": 4660, "wz": 4660, "r": 1 },
    "cycles": 10
  },
  {
    "name": "cd 00 80: call nn",
    "initial": { "sp": 65535, "ram": [[0, 205], [1, 0], [2, 128]] },
    "final": {
      "pc": 32768, "sp": 65533, "wz": 32768, "r": 1,
      "ram": [[0, 205], [1, 0], [2, 128], [65533, 3], [65534, 0]]
    },
    "cycles": 17
  },
  {
    "name": "af: xor a",
    "initial": { "a": 85, "ram": [[0, 175]] },
    "final": { "a": 0, "f": 68, "pc": 1, "r": 1 },
    "cycles": 4
  },
  {
    "name": "dd 21 78 56: ld ix,nn",
    "initial": { "ram": [[0, 221], [1, 33], [2, 120], [3, 86]] },
    "final": { "ix": 22136, "pc": 4, "r": 2 },
    "cycles": 14
  },
  {
    "name": "cb c7: set 0,a",
    "initial": { "ram": [[0, 203], [1, 199]] },
    "final": { "a": 1, "pc": 2, "r": 2 },
    "cycles": 8
  },
  {
    "name": "db 7f: in a,(n)",
    "initial": { "a": 16, "ram": [[0, 219], [1, 127]] },
    "final": { "a": 153, "wz": 4224, "pc": 2, "r": 1 },
    "cycles": 11,
    "ports": [[4223, 153, "r"]]
  },
  {
    "name": "d3 fe: out (n),a",
    "initial": { "a": 2, "ram": [[0, 211], [1, 254]] },
    "final": { "a": 2, "wz": 767, "pc": 2, "r": 1 },
    "cycles": 11,
    "ports": [[766, 2, "w"]]
  },
  {
    "name": "ed 44: neg",
    "initial": { "a": 1, "ram": [[0, 237], [1, 68]] },
    "final": { "a": 255, "f": 187, "pc": 2, "r": 2 },
    "cycles": 8
  },
  {
    "name": "76: halt",
    "initial": { "ram": [[0, 118]] },
    "final": { "pc": 1, "r": 1, "halted": 1 },
    "cycles": 4
  }
]"#;
