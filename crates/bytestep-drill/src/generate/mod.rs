//! Random program generation for a requested level.
//!
//! Every generated program classifies as the requested level and runs to
//! completion: immediates are drawn from ranges that keep each register
//! inside the level's width class, so no step can overflow.

mod bounds;
mod levels;

pub use bounds::{add_immediate_range, sample_outside, sub_immediate_range};

use bytestep_core::{format_hex_compact, format_hex_spaced};
use rand::Rng;
use thiserror::Error;

use crate::level::{Level, WidthClass};

/// A generated program in byte and text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    /// Level the program was generated for.
    pub level: Level,
    /// Machine code.
    pub bytes: Vec<u8>,
    /// Space-separated hex (`"b8 2a 00 00 00"`).
    pub spaced: String,
    /// Unspaced hex (`"b82a000000"`).
    pub compact: String,
}

impl GeneratedProgram {
    fn new(level: Level, bytes: Vec<u8>) -> Self {
        Self {
            level,
            spaced: format_hex_spaced(&bytes),
            compact: format_hex_compact(&bytes),
            bytes,
        }
    }
}

/// Generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// The requested level has no program shape.
    #[error("unsupported level {0}; expected 1 to 4")]
    UnsupportedLevel(u8),
}

/// Generates a program for `level` using `rng`.
///
/// # Errors
///
/// Returns [`GenerateError::UnsupportedLevel`] for [`Level::Unclassified`].
pub fn generate<R: Rng + ?Sized>(
    level: Level,
    rng: &mut R,
) -> Result<GeneratedProgram, GenerateError> {
    let bytes = match level {
        Level::Unclassified => return Err(GenerateError::UnsupportedLevel(level.as_u8())),
        Level::One => levels::single_register(rng, WidthClass::Byte),
        Level::Two => levels::single_register(rng, WidthClass::Word),
        Level::Three => levels::single_register(rng, WidthClass::Dword),
        Level::Four => levels::multi_register(rng),
    };

    let program = GeneratedProgram::new(level, bytes);
    tracing::debug!(%level, hex = %program.spaced, "generated program");
    Ok(program)
}

/// Generates a program for a numeric level.
///
/// # Errors
///
/// Returns [`GenerateError::UnsupportedLevel`] for anything outside `1..=4`.
pub fn generate_for<R: Rng + ?Sized>(
    level: u8,
    rng: &mut R,
) -> Result<GeneratedProgram, GenerateError> {
    let level = Level::from_u8(level).ok_or(GenerateError::UnsupportedLevel(level))?;
    generate(level, rng)
}
