//! Generated programs must classify as requested and run without faulting.

#![allow(clippy::pedantic, clippy::nursery)]

use bytestep_core::{run, CoreConfig, Cpu, NoopTraceSink, Register};
use bytestep_drill::{classify_bytes, classify_hex, generate, Level, WidthClass};
use proptest::prelude::*;
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

#[rstest]
#[case(Level::One)]
#[case(Level::Two)]
#[case(Level::Three)]
#[case(Level::Four)]
fn generated_level_round_trips_through_classifier_and_engine(#[case] level: Level) {
    for seed in 0..100 {
        let mut rng = StdRng::seed_from_u64(u64::from(level.as_u8()) * 1_000 + seed);
        let program = generate(level, &mut rng).expect("supported level");

        let classification = classify_hex(&program.compact).expect("compact hex classifies");
        assert_eq!(classification.level, level, "{}", program.spaced);
        assert_eq!(
            classify_hex(&program.spaced).expect("spaced hex classifies"),
            classification
        );

        let mut cpu = Cpu::new();
        let report = run(
            &mut cpu,
            &program.bytes,
            &CoreConfig::default(),
            &mut NoopTraceSink,
        )
        .unwrap_or_else(|fault| panic!("{} faulted: {fault}", program.spaced));
        assert!(report.result.is_some(), "{}", program.spaced);
    }
}

#[rstest]
#[case(Level::One, WidthClass::Byte)]
#[case(Level::Two, WidthClass::Word)]
#[case(Level::Three, WidthClass::Dword)]
fn single_register_levels_stay_in_their_width(#[case] level: Level, #[case] class: WidthClass) {
    let bounds = class.bounds();
    for seed in 0..100 {
        let program =
            generate(level, &mut StdRng::seed_from_u64(seed)).expect("supported level");
        let mut cpu = Cpu::new();
        run(
            &mut cpu,
            &program.bytes,
            &CoreConfig::default(),
            &mut NoopTraceSink,
        )
        .expect("generated programs never fault");

        let rax = i32::try_from(cpu.register(Register::Rax)).expect("rax fits i32");
        assert!(bounds.contains(&rax), "{} left {class:?}", program.spaced);
        assert_eq!(cpu.register(Register::Rbx), 0);
    }
}

#[test]
fn stepped_rng_yields_a_fixed_level_one_program() {
    let mut rng = StepRng::new(0x4000_0000, 0x4000_0000);
    let program = generate(Level::One, &mut rng).expect("level one");

    assert_eq!(program.compact, "b8c0ffffff4881c050000000");
    assert_eq!(program.spaced, "b8 c0 ff ff ff 48 81 c0 50 00 00 00");

    let mut cpu = Cpu::new();
    let report = run(
        &mut cpu,
        &program.bytes,
        &CoreConfig::default(),
        &mut NoopTraceSink,
    )
    .expect("mov rax, -64; add rax, 80");
    assert_eq!(report.result, Some(16));
}

proptest! {
    #[test]
    fn any_seed_round_trips_for_every_level(seed in any::<u64>(), pick in 0_usize..4) {
        let level = Level::GENERATABLE[pick];
        let program = generate(level, &mut StdRng::seed_from_u64(seed)).expect("supported level");
        prop_assert_eq!(classify_hex(&program.compact).map(|c| c.level), Ok(level));
        let mut cpu = Cpu::new();
        prop_assert!(run(&mut cpu, &program.bytes, &CoreConfig::default(), &mut NoopTraceSink).is_ok());
    }

    #[test]
    fn level_four_never_overflows(seed in any::<u64>()) {
        let program = generate(Level::Four, &mut StdRng::seed_from_u64(seed)).expect("level four");
        let mut cpu = Cpu::new();
        prop_assert!(run(&mut cpu, &program.bytes, &CoreConfig::default(), &mut NoopTraceSink).is_ok());
        for reg in Register::ALL {
            prop_assert!(i32::try_from(cpu.register(reg)).is_ok());
        }
        prop_assert_eq!(classify_bytes(&program.bytes).map(|c| c.level), Ok(Level::Four));
    }
}
