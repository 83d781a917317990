//! Difficulty levels, program classification and generation for bytestep drills.

/// Difficulty levels and immediate width classes.
pub mod level;
pub use level::{Level, WidthClass};

/// Static level classification.
pub mod classify;
pub use classify::{classify_bytes, classify_hex, level_for, ClassifyError, Classification};

/// Random program generation per level.
pub mod generate;
pub use generate::{generate, generate_for, GenerateError, GeneratedProgram};

use tracing_subscriber as _;
