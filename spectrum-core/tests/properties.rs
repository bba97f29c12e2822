//! Property tests: identical construction and inputs give bit-identical
//! observable state, for arbitrary (and adversarial) code bytes.

use proptest::prelude::*;
use spectrum_core::{MachineConfig, Spectrum48};

/// Build a machine, install `code` at `pc`, and run it for at most
/// `ticks` ticks with a constant input-hook response.
fn run_machine(code: &[u8], pc: u16, ticks: u32, input_value: u8) -> Spectrum48 {
    let mut machine = Spectrum48::new(&MachineConfig::new());
    let start = usize::from(pc);
    machine.memory_mut().bytes_mut()[start..start + code.len()].copy_from_slice(code);
    machine.state_mut().set_pc(pc);
    machine.set_ticks_limit(ticks);
    machine.set_input_hook(move |_ctx, _port| Ok(input_value));
    machine.run().expect("valid state");
    machine.render_screen();
    machine
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any byte soup is a legal program, and two machines fed the same
    /// soup stay in lock step.
    #[test]
    fn determinism_under_arbitrary_programs(
        code in proptest::collection::vec(any::<u8>(), 1..512),
        input_value in any::<u8>(),
        ticks in 1_000u32..40_000,
    ) {
        let a = run_machine(&code, 0x8000, ticks, input_value);
        let b = run_machine(&code, 0x8000, ticks, input_value);

        prop_assert_eq!(a.state().bytes(), b.state().bytes());
        prop_assert_eq!(a.memory().bytes(), b.memory().bytes());
        prop_assert_eq!(a.screen().as_slice(), b.screen().as_slice());
        prop_assert_eq!(a.port_writes(), b.port_writes());
    }

    /// The renderer's tick never exceeds the frame length, whatever the
    /// program does.
    #[test]
    fn render_tick_stays_within_the_frame(
        code in proptest::collection::vec(any::<u8>(), 1..128),
        ticks in 1_000u32..80_000,
    ) {
        let mut machine = run_machine(&code, 0x8000, ticks, 0xFF);
        let screen = machine.render_screen();
        // Completing the render after an arbitrary stop must be safe and
        // idempotent in size.
        prop_assert_eq!(screen.as_slice().len(), 280 * 44);
    }
}
