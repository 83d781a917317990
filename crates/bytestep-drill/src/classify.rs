//! Static difficulty classification of a program.
//!
//! The scan reuses the engine's [`Decoder`] but never executes anything: it
//! records the widest immediate seen and how many add/subtract forms occur.

use bytestep_core::{
    classify_opcode, parse_hex, DecodeFault, Decoder, HexParseError, Immediate, Instruction,
};
use thiserror::Error;

use crate::level::{Level, WidthClass};

/// Summary of one program scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Assigned level.
    pub level: Level,
    /// Widest immediate class observed, `None` when no immediate occurs.
    pub width: Option<WidthClass>,
    /// Number of add/subtract instructions.
    pub calculations: usize,
}

/// Failure to scan a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// Input text was not valid hex.
    #[error("error parsing hex input: {0}")]
    Hex(#[from] HexParseError),
    /// The byte stream does not decode.
    #[error(transparent)]
    Decode(#[from] DecodeFault),
}

/// Applies the level rules, in order.
#[must_use]
pub const fn level_for(width: Option<WidthClass>, calculations: usize) -> Level {
    match (width, calculations) {
        (Some(WidthClass::Byte), 1..) => Level::One,
        (Some(WidthClass::Word), _) => Level::Two,
        (Some(WidthClass::Dword), 1) => Level::Three,
        (Some(WidthClass::Dword), 2..) => Level::Four,
        _ => Level::Unclassified,
    }
}

/// Classifies a decoded byte buffer.
///
/// # Errors
///
/// Returns the first decode fault.
pub fn classify_bytes(code: &[u8]) -> Result<Classification, DecodeFault> {
    let mut width = None;
    let mut calculations = 0;

    for instr in Decoder::new(code) {
        let instr = instr?;
        if classify_opcode(instr.opcode).is_some_and(|encoding| encoding.is_calculation()) {
            calculations += 1;
        }
        width = width.max(immediate_class(&instr));
    }

    Ok(Classification {
        level: level_for(width, calculations),
        width,
        calculations,
    })
}

/// Parses hex text (spaced or compact) and classifies it.
///
/// # Errors
///
/// Returns [`ClassifyError::Hex`] for malformed text and
/// [`ClassifyError::Decode`] when the bytes do not decode.
pub fn classify_hex(text: &str) -> Result<Classification, ClassifyError> {
    let code = parse_hex(text)?;
    Ok(classify_bytes(&code)?)
}

fn immediate_class(instr: &Instruction) -> Option<WidthClass> {
    instr.immediate.map(|imm| match imm {
        Immediate::Imm32(value) => WidthClass::of(i64::from(value)),
        Immediate::Imm64(_) => WidthClass::Dword,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytestep_core::DecodeFaultReason;
    use rstest::rstest;

    #[rstest]
    #[case::byte_add("b8050000004881c002000000", Level::One)]
    #[case::word_value("b8e80300004881e80a000000", Level::Two)]
    #[case::word_without_calculation("b8e8030000", Level::Two)]
    #[case::dword_single_add("b8a086010005ffffffff", Level::Three)]
    #[case::dword_two_calculations("b8a08601004801d805ffffffff", Level::Four)]
    #[case::byte_without_calculation("b805000000", Level::Unclassified)]
    #[case::movabs_is_widest("48b8010000000000000005010000004801d8", Level::Four)]
    #[case::no_immediates("4889c34801d8", Level::Unclassified)]
    fn assigns_levels(#[case] text: &str, #[case] expected: Level) {
        let classification = classify_hex(text).expect("valid program");
        assert_eq!(classification.level, expected, "{text}");
    }

    #[test]
    fn counts_every_calculation_form() {
        let text = "4801d8 4829d8 4881c001000000 4881e801000000 0501000000 2d01000000 4889c3";
        let classification = classify_hex(text).expect("valid program");
        assert_eq!(classification.calculations, 6);
        assert_eq!(classification.width, Some(WidthClass::Byte));
    }

    #[test]
    fn group1_selectors_outside_add_sub_still_count() {
        let classification = classify_hex("4881f801000000").expect("cmp decodes");
        assert_eq!(classification.calculations, 1);
    }

    #[test]
    fn level_rules_apply_in_order() {
        assert_eq!(level_for(Some(WidthClass::Byte), 0), Level::Unclassified);
        assert_eq!(level_for(Some(WidthClass::Word), 0), Level::Two);
        assert_eq!(level_for(Some(WidthClass::Dword), 0), Level::Unclassified);
        assert_eq!(level_for(None, 3), Level::Unclassified);
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let err = classify_hex("48 01 00").expect_err("memory operand");
        assert!(matches!(
            err,
            ClassifyError::Decode(fault)
                if matches!(fault.reason, DecodeFaultReason::UnsupportedAddressingMode { .. })
        ));
        assert!(matches!(classify_hex("b8 0"), Err(ClassifyError::Hex(_))));
    }
}
