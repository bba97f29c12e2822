//! End-to-end machine scenarios: deterministic memory fill, ROM
//! protection, border stripes, contention accounting, breakpoints and
//! interrupt acceptance, each observed through the host-facing views
//! only.

use spectrum_core::{
    Events, MachineConfig, Spectrum48, BORDER_WIDTH, FRAME_HEIGHT, FRAME_WIDTH,
    TICKS_PER_FRAME, TOP_BORDER_HEIGHT,
};

/// A machine with a program installed at `addr` and PC pointing at it.
fn with_program(addr: u16, program: &[u8]) -> Spectrum48 {
    let mut machine = Spectrum48::new(&MachineConfig::new());
    let start = usize::from(addr);
    machine.memory_mut().bytes_mut()[start..start + program.len()]
        .copy_from_slice(program);
    machine.state_mut().set_pc(addr);
    machine
}

/// The ULA's beam-position delay rule, written out independently of the
/// implementation under test.
fn contention_delay(t: u32) -> u32 {
    if !(14_336..14_336 + 192 * 224).contains(&t) {
        return 0;
    }
    let offset = t - 14_336;
    if offset % 224 >= 128 {
        return 0;
    }
    match offset % 8 {
        7 => 0,
        u => 6 - u,
    }
}

#[test]
fn cold_reset_memory_fill() {
    let machine = Spectrum48::new(&MachineConfig::new());

    // Recompute the contractual fill sequence.
    let mut seed: u32 = 0xDE34_7A01;
    for addr in 0..4u16 {
        assert_eq!(machine.memory().read(addr), seed as u8, "cell {addr}");
        seed = seed.wrapping_mul(0x7439_2CEF) ^ (seed >> 16);
    }
    assert_eq!(machine.memory().read(0), 0x01);
}

#[test]
fn rom_write_protect() {
    let mut machine = Spectrum48::new(&MachineConfig::new());
    let original = machine.memory().read(0x0000);
    machine.memory_mut().write(0x0000, 0x00);
    assert_eq!(machine.memory().read(0x0000), original);
}

#[test]
fn border_stripe_from_out_to_fe() {
    // LD A,2; OUT (0xFE),A; HALT
    let mut machine = with_program(0x8000, &[0x3E, 0x02, 0xD3, 0xFE, 0x76]);
    let events = machine.run().expect("valid state");
    assert!(events.contains(Events::END_OF_FRAME));

    // Exactly one port write: LD A,2 costs 7 ticks, the OUT reaches its
    // output cycle after M1 (4) and the port operand read (3).
    let writes = machine.port_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].addr & 0xFF, 0xFE);
    assert_eq!(writes[0].addr, 0x02FE);
    assert_eq!(writes[0].value, 0x02);
    assert_eq!(writes[0].tick, 14);

    // The whole visible border is red: the write landed while the beam
    // was still in the hidden top lines.
    let screen = machine.render_screen();
    assert_eq!(screen.pixel(0, 0), 2);
    assert_eq!(screen.pixel(0, FRAME_WIDTH - 1), 2);
    assert_eq!(screen.pixel(FRAME_HEIGHT - 1, 0), 2);
    assert_eq!(screen.pixel(TOP_BORDER_HEIGHT + 10, 3), 2);
    assert_eq!(machine.state().border_colour(), 2);
}

#[test]
fn contended_reads_accumulate_ula_delays() {
    // Sixteen LD A,($4000) in a row, entered exactly at the contention
    // base tick.
    let mut program = Vec::new();
    for _ in 0..16 {
        program.extend_from_slice(&[0x3A, 0x00, 0x40]);
    }
    let mut machine = with_program(0x8000, &program);
    machine.state_mut().set_ticks_since_int(14_336);
    machine.set_fetches_limit(16);

    let events = machine.run().expect("valid state");
    assert!(events.contains(Events::FETCHES_LIMIT_HIT));

    // Model the run with the delay rule above: 10 uncontended ticks of
    // fetch and operand reads, a stall against $4000, 3 ticks of read.
    let mut expected = 14_336u32;
    for _ in 0..16 {
        expected += 10;
        expected += contention_delay(expected);
        expected += 3;
    }
    assert_eq!(machine.state().ticks_since_int(), expected);
    // Strictly slower than the uncontended 13 ticks per instruction.
    assert!(expected > 14_336 + 16 * 13);
}

#[test]
fn breakpoint_on_fallthrough_pc() {
    // A NOP at $7FFF falls through into $8000, which carries a
    // breakpoint mark.
    let mut machine = with_program(0x7FFF, &[0x00]);
    machine.set_breakpoint(0x8000);
    let events = machine.run().expect("valid state");
    assert!(events.contains(Events::BREAKPOINT_HIT));
    assert!(!events.contains(Events::END_OF_FRAME), "no frame advance");
    assert_eq!(machine.state().pc(), 0x8000);
}

#[test]
fn im2_interrupt_accepted_at_frame_start() {
    // HALT at $8000; IM 2 vector table at $80FF points to $1234, where
    // another HALT sits.
    let mut machine = with_program(0x8000, &[0x76]);
    machine.memory_mut().bytes_mut()[0x80FF] = 0x34;
    machine.memory_mut().bytes_mut()[0x8100] = 0x12;
    machine.memory_mut().bytes_mut()[0x1234] = 0x76;
    machine.state_mut().set_iff1(true);
    machine.state_mut().set_int_mode(2);
    machine.state_mut().set_ir(0x8000);
    machine.state_mut().set_sp(0xFFFF);
    machine.state_mut().set_int_after_ei_allowed(false);
    machine.set_fetches_limit(1);

    machine.run().expect("valid state");

    // 19 ticks of acceptance plus the 4-tick M1 of the handler's HALT.
    assert_eq!(machine.state().ticks_since_int(), 23);
    assert_eq!(machine.state().pc(), 0x1235);
    assert_eq!(machine.state().sp(), 0xFFFD);
    assert_eq!(machine.memory().read16(0xFFFD), 0x8000);
    assert!(!machine.state().iff1());
    assert!(!machine.state().iff2());
}

#[test]
fn screen_round_trip_to_rgb() {
    // Top-left cell: pattern $F0 (four ink pixels, four paper pixels),
    // bright blue ink on normal white paper.
    let mut machine = with_program(0x8000, &[0x76]);
    machine.memory_mut().bytes_mut()[0x4000] = 0xF0;
    machine.memory_mut().bytes_mut()[0x5800] = 0x40 | (7 << 3) | 1;
    machine.run().expect("valid state");

    let pixels = machine.frame_pixels();
    assert_eq!(pixels.len(), (FRAME_WIDTH * FRAME_HEIGHT) as usize);

    let row = TOP_BORDER_HEIGHT * FRAME_WIDTH;
    let left = row + BORDER_WIDTH;
    // Bright ink: blue at full luminance. Bright attribute lifts the
    // paper white to full luminance as well.
    for x in 0..4 {
        assert_eq!(pixels[(left + x) as usize], 0x0000_00FF, "ink {x}");
    }
    for x in 4..8 {
        assert_eq!(pixels[(left + x) as usize], 0x00FF_FFFF, "paper {x}");
    }
    // Border pixel: white at border luminance.
    assert_eq!(pixels[row as usize], 0x00CC_CCCC);
}

#[test]
fn flash_attribute_swaps_after_16_frames() {
    // FLASH cell with red ink on black paper and an all-ink pattern.
    let mut machine = with_program(0x8000, &[0x18, 0xFE]);
    machine.memory_mut().bytes_mut()[0x4000] = 0xFF;
    machine.memory_mut().bytes_mut()[0x5800] = 0x80 | 2;

    machine.run().expect("valid state");
    let ink = machine.render_screen().pixel(TOP_BORDER_HEIGHT, BORDER_WIDTH);
    assert_eq!(ink, 2);

    // Frames 2..=17: the 17th run starts its frame with the mask
    // inverted (16 completed frames).
    for _ in 0..16 {
        machine.run().expect("valid state");
    }
    let swapped = machine.render_screen().pixel(TOP_BORDER_HEIGHT, BORDER_WIDTH);
    assert_eq!(swapped, 0, "ink and paper swapped by FLASH");
}

#[test]
fn tick_accounting_of_an_uncontended_loop() {
    // JR -2 is 12 ticks; a frame of them is exactly 69,888 ticks.
    let mut machine = with_program(0x8000, &[0x18, 0xFE]);
    let events = machine.run().expect("valid state");
    assert!(events.contains(Events::END_OF_FRAME));
    assert_eq!(machine.state().ticks_since_int(), TICKS_PER_FRAME);
}

#[test]
fn default_input_reads_bf() {
    // IN A,(0xFE); HALT, with no input hook installed.
    let mut machine = with_program(0x8000, &[0xDB, 0xFE, 0x76]);
    machine.set_fetches_limit(2);
    machine.run().expect("valid state");
    assert_eq!(machine.state().af() >> 8, 0xBF);
}

#[test]
fn input_hook_failure_stops_with_default_value() {
    let mut machine = with_program(0x8000, &[0xDB, 0xFE, 0x76]);
    machine.set_input_hook(|_ctx, port| {
        Err(spectrum_core::HookError(format!("no device on {port:04X}")))
    });
    let events = machine.run().expect("valid state");
    assert!(events.contains(Events::MACHINE_STOPPED));
    assert_eq!(machine.state().af() >> 8, 0xBF);
}
