//! Byte-stream decoder for the supported x86-64 subset.
//!
//! A [`Decoder`] owns a single forward cursor over one buffer and yields
//! [`Instruction`] records lazily. It never touches register state; pair it
//! with [`crate::Cpu`] to execute what it produces.

use std::iter::FusedIterator;

use crate::encoding::{classify_opcode, is_widening_prefix, ImmediateLayout};
use crate::fault::{DecodeFault, DecodeFaultReason};

/// Addressing mode selected by the top two bits of an operand-encoding byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressingMode {
    /// `00`: memory at `[reg]`.
    Indirect,
    /// `01`: memory at `[reg + disp8]`.
    IndirectDisp8,
    /// `10`: memory at `[reg + disp32]`.
    IndirectDisp32,
    /// `11`: register operand. The only mode the engine accepts.
    DirectRegister,
}

impl AddressingMode {
    /// Converts the 2-bit mode field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => Self::Indirect,
            0b01 => Self::IndirectDisp8,
            0b10 => Self::IndirectDisp32,
            _ => Self::DirectRegister,
        }
    }
}

/// Operand-encoding (ModRM) byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ModRm(u8);

impl ModRm {
    /// Wraps a raw operand byte.
    #[must_use]
    pub const fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw byte value.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Top two bits.
    #[must_use]
    pub const fn mode_bits(self) -> u8 {
        self.0 >> 6
    }

    /// Addressing mode of the byte.
    #[must_use]
    pub const fn mode(self) -> AddressingMode {
        AddressingMode::from_bits(self.mode_bits())
    }

    /// Returns true for direct-register addressing.
    #[must_use]
    pub const fn is_direct(self) -> bool {
        matches!(self.mode(), AddressingMode::DirectRegister)
    }

    /// Bits 5..3: source register code, or sub-opcode selector for group forms.
    #[must_use]
    pub const fn reg_field(self) -> u8 {
        (self.0 >> 3) & 0x07
    }

    /// Bits 2..0: destination register code.
    #[must_use]
    pub const fn rm_field(self) -> u8 {
        self.0 & 0x07
    }
}

/// Immediate operand, either width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Immediate {
    /// 4-byte little-endian two's-complement immediate.
    Imm32(i32),
    /// 8-byte little-endian immediate (only after a widening prefix on `B8+r`).
    Imm64(i64),
}

impl Immediate {
    /// Value as a full-width register operand; 32-bit immediates are sign-extended.
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Self::Imm32(value) => i64::from(value),
            Self::Imm64(value) => value,
        }
    }
}

/// One decoded instruction record.
///
/// Records are produced and consumed one step at a time; the CPU advances its
/// program counter by `length` after applying one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    /// Widening prefix byte, if one preceded the opcode.
    pub prefix: Option<u8>,
    /// Primary opcode byte.
    pub opcode: u8,
    /// Operand-encoding byte, for forms that carry one.
    pub modrm: Option<ModRm>,
    /// Immediate operand, for forms that carry one.
    pub immediate: Option<Immediate>,
    /// Total bytes consumed, prefix included.
    pub length: usize,
}

impl Instruction {
    /// Whether a widening prefix preceded the opcode.
    #[must_use]
    pub const fn is_widened(&self) -> bool {
        self.prefix.is_some()
    }

    /// The 32-bit immediate, if this record carries one.
    #[must_use]
    pub const fn imm32(&self) -> Option<i32> {
        match self.immediate {
            Some(Immediate::Imm32(value)) => Some(value),
            _ => None,
        }
    }

    /// The 64-bit immediate, if this record carries one.
    #[must_use]
    pub const fn imm64(&self) -> Option<i64> {
        match self.immediate {
            Some(Immediate::Imm64(value)) => Some(value),
            _ => None,
        }
    }
}

struct ByteCursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl ByteCursor<'_> {
    fn read_u8(&mut self) -> Result<u8, DecodeFault> {
        let byte = self
            .code
            .get(self.pos)
            .copied()
            .ok_or_else(|| DecodeFault::new(self.pos, DecodeFaultReason::TruncatedInput))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeFault> {
        let rest = self.code.get(self.pos..).unwrap_or_default();
        let bytes = rest.first_chunk::<N>().copied().ok_or_else(|| {
            DecodeFault::new(
                self.pos,
                DecodeFaultReason::TruncatedImmediate {
                    expected: N,
                    available: rest.len(),
                },
            )
        })?;
        self.pos += N;
        Ok(bytes)
    }
}

/// Forward-only instruction decoder over one byte buffer.
///
/// Not restartable: construct a fresh decoder to scan the same bytes again.
/// As an [`Iterator`] it yields `Err` at most once and then ends.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    code: &'a [u8],
    pos: usize,
    faulted: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder positioned at the start of `code`.
    #[must_use]
    pub const fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            pos: 0,
            faulted: false,
        }
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Whether unread bytes remain.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.pos < self.code.len()
    }

    /// Decodes the instruction at the cursor.
    ///
    /// On success the cursor advances by exactly the instruction length. On
    /// failure the cursor stays at the start of the rejected instruction.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeFault`] carrying the offset where decoding failed:
    /// truncated input, unknown opcode, non-register addressing mode, or a
    /// truncated immediate.
    pub fn decode_next(&mut self) -> Result<Instruction, DecodeFault> {
        let start = self.pos;
        let mut cursor = ByteCursor {
            code: self.code,
            pos: start,
        };

        let first = cursor.read_u8()?;
        let (prefix, opcode_offset, opcode) = if is_widening_prefix(first) {
            let offset = cursor.pos;
            (Some(first), offset, cursor.read_u8()?)
        } else {
            (None, start, first)
        };

        let Some(encoding) = classify_opcode(opcode) else {
            return Err(DecodeFault::new(
                opcode_offset,
                DecodeFaultReason::UnknownOpcode(opcode),
            ));
        };
        let layout = encoding.layout();

        let modrm = if layout.modrm {
            let offset = cursor.pos;
            let modrm = ModRm::new(cursor.read_u8()?);
            if !modrm.is_direct() {
                return Err(DecodeFault::new(
                    offset,
                    DecodeFaultReason::UnsupportedAddressingMode {
                        modrm: modrm.byte(),
                        mode: modrm.mode_bits(),
                    },
                ));
            }
            Some(modrm)
        } else {
            None
        };

        let immediate = match layout.immediate {
            ImmediateLayout::None => None,
            ImmediateLayout::Imm32OrImm64 if prefix.is_some() => {
                Some(Immediate::Imm64(i64::from_le_bytes(cursor.read_array()?)))
            }
            ImmediateLayout::Imm32 | ImmediateLayout::Imm32OrImm64 => {
                Some(Immediate::Imm32(i32::from_le_bytes(cursor.read_array()?)))
            }
        };

        self.pos = cursor.pos;
        Ok(Instruction {
            prefix,
            opcode,
            modrm,
            immediate,
            length: cursor.pos - start,
        })
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Instruction, DecodeFault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.faulted || !self.has_more() {
            return None;
        }
        let result = self.decode_next();
        self.faulted = result.is_err();
        Some(result)
    }
}

impl FusedIterator for Decoder<'_> {}
