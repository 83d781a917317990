//! Hex text parsing and formatting for machine-code input/output.

use thiserror::Error;

/// Rejected hex text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum HexParseError {
    /// Digit count (spaces removed) is odd.
    #[error("hex string length must be even (got {len} digits)")]
    OddLength {
        /// Digit count after removing spaces.
        len: usize,
    },
    /// A character is not a hex digit.
    #[error("invalid hex character {character:?} at position {position}")]
    InvalidCharacter {
        /// Offending character.
        character: char,
        /// Character index into the input with spaces removed.
        position: usize,
    },
}

/// Parses hex digit pairs, optionally separated by spaces, case-insensitively.
///
/// # Errors
///
/// Returns [`HexParseError::OddLength`] when the digit count is odd and
/// [`HexParseError::InvalidCharacter`] for any non-hex character.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, HexParseError> {
    let digits: String = text.chars().filter(|c| *c != ' ').collect();

    if let Some((position, character)) = digits
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_hexdigit())
    {
        return Err(HexParseError::InvalidCharacter {
            character,
            position,
        });
    }

    ::hex::decode(&digits).map_err(|err| match err {
        ::hex::FromHexError::InvalidHexCharacter { c, index } => HexParseError::InvalidCharacter {
            character: c,
            position: index,
        },
        ::hex::FromHexError::OddLength | ::hex::FromHexError::InvalidStringLength => {
            HexParseError::OddLength { len: digits.len() }
        }
    })
}

/// Lowercase two-digit pairs joined by single spaces (`"b8 2a 00 00 00"`).
#[must_use]
pub fn format_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase digits without separators (`"b82a000000"`).
#[must_use]
pub fn format_hex_compact(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}
