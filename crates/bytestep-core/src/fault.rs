use thiserror::Error;

use crate::execute::ArithOp;

/// Pipeline stage that raised a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Byte stream could not be turned into an instruction record.
    Decode,
    /// Instruction record could not be applied to the register file.
    Execute,
}

/// Why the decoder rejected the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodeFaultReason {
    /// A prefix, opcode or operand-encoding byte was required but the buffer ended.
    #[error("unexpected end of code")]
    TruncatedInput,
    /// Opcode byte is not in the supported opcode table.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    /// Operand-encoding byte selects a memory operand.
    #[error("memory access not supported (mode {mode:#04b} in operand byte 0x{modrm:02x})")]
    UnsupportedAddressingMode {
        /// Raw operand-encoding byte.
        modrm: u8,
        /// Its top two bits.
        mode: u8,
    },
    /// Fewer immediate bytes remain than the instruction form requires.
    #[error("truncated immediate: expected {expected} bytes, {available} available")]
    TruncatedImmediate {
        /// Immediate width required by the form (4 or 8).
        expected: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
}

/// Decode failure with the byte offset where it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("decode fault at offset {offset}: {reason}")]
pub struct DecodeFault {
    /// Offset of the offending (or missing) byte.
    pub offset: usize,
    /// Failure reason.
    pub reason: DecodeFaultReason,
}

impl DecodeFault {
    /// Creates a decode fault.
    #[must_use]
    pub const fn new(offset: usize, reason: DecodeFaultReason) -> Self {
        Self { offset, reason }
    }
}

/// Why the CPU refused to apply an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExecuteFaultReason {
    /// Signed 64-bit add/subtract result is not representable.
    #[error("overflow detected in {operation}")]
    Overflow {
        /// Operation that overflowed.
        operation: ArithOp,
    },
    /// Sub-opcode selector in the operand byte is not implemented for this opcode.
    #[error("unsupported 0x{opcode:02x} sub-opcode: {selector}")]
    UnsupportedSubOpcode {
        /// Primary opcode.
        opcode: u8,
        /// 3-bit selector taken from the operand byte.
        selector: u8,
    },
    /// Opcode is not part of the supported table.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    /// Register code names a register that is not modelled.
    #[error("not allowed register code: {code}")]
    UnsupportedRegister {
        /// 3-bit register code.
        code: u8,
    },
    /// Instruction record lacks an operand byte or immediate its opcode requires.
    #[error("instruction 0x{0:02x} is missing required operands")]
    MalformedInstruction(u8),
}

/// Execute failure with the program counter of the refused instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("execute fault at pc {pc}: {reason}")]
pub struct ExecuteFault {
    /// Program counter at the time of the fault; never advanced past the instruction.
    pub pc: usize,
    /// Failure reason.
    pub reason: ExecuteFaultReason,
}

impl ExecuteFault {
    /// Creates an execute fault.
    #[must_use]
    pub const fn new(pc: usize, reason: ExecuteFaultReason) -> Self {
        Self { pc, reason }
    }

    /// Returns `true` for signed-overflow faults.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        matches!(self.reason, ExecuteFaultReason::Overflow { .. })
    }
}

/// Any terminal fault of a decode/execute run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Decoder fault.
    #[error(transparent)]
    Decode(#[from] DecodeFault),
    /// CPU fault.
    #[error(transparent)]
    Execute(#[from] ExecuteFault),
}

impl Fault {
    /// Returns the stage that raised this fault.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::Decode(_) => FaultClass::Decode,
            Self::Execute(_) => FaultClass::Execute,
        }
    }

    /// Byte offset (decode) or program counter (execute) of the fault.
    #[must_use]
    pub const fn position(&self) -> usize {
        match self {
            Self::Decode(fault) => fault.offset,
            Self::Execute(fault) => fault.pc,
        }
    }
}
