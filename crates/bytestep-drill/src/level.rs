//! Difficulty levels and immediate width classes.

use std::fmt;
use std::ops::RangeInclusive;

/// Difficulty level assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// No level rule matched.
    Unclassified = 0,
    /// Byte-sized values and at least one calculation.
    One = 1,
    /// Word-sized values.
    Two = 2,
    /// Dword-sized values and exactly one calculation.
    Three = 3,
    /// Dword-sized values and several calculations.
    Four = 4,
}

impl Level {
    /// Levels the generator can produce, easiest first.
    pub const GENERATABLE: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// Maps a numeric level (`0..=4`).
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unclassified),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Numeric level.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => f.write_str("unclassified"),
            level => write!(f, "level {}", level.as_u8()),
        }
    }
}

/// Narrowest signed width an immediate fits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum WidthClass {
    /// Fits `i8`.
    Byte = 1,
    /// Fits `i16`.
    Word = 2,
    /// Anything wider.
    Dword = 4,
}

impl WidthClass {
    /// Classifies a value.
    #[must_use]
    pub fn of(value: i64) -> Self {
        if i8::try_from(value).is_ok() {
            Self::Byte
        } else if i16::try_from(value).is_ok() {
            Self::Word
        } else {
            Self::Dword
        }
    }

    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        self as u8
    }

    /// Signed value range of the class, capped at `i32` for `Dword`.
    #[must_use]
    pub fn bounds(self) -> RangeInclusive<i32> {
        match self {
            Self::Byte => i32::from(i8::MIN)..=i32::from(i8::MAX),
            Self::Word => i32::from(i16::MIN)..=i32::from(i16::MAX),
            Self::Dword => i32::MIN..=i32::MAX,
        }
    }
}
