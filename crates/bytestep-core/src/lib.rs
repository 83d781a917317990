//! Decode/execute engine for a small teaching subset of x86-64 machine code.
//!
//! Bytes flow through [`Decoder`] into [`Instruction`] records, which a
//! [`Cpu`] applies to a four-register file. [`run`] drives the loop and stops
//! at the first fault.

/// Architectural register model.
pub mod state;
pub use state::{Register, RegisterFile, REGISTER_COUNT};

/// Opcode classification tables and instruction byte builders.
pub mod encoding;
pub use encoding::{
    classify_opcode, encode_add_acc_imm32, encode_add_imm32, encode_add_reg_reg,
    encode_mov_imm32, encode_mov_imm64, encode_mov_reg_reg, encode_mov_rm_imm32,
    encode_sub_acc_imm32, encode_sub_imm32, encode_sub_reg_reg, encode_xor_reg_reg,
    is_widening_prefix, modrm_direct, ImmediateLayout, OpcodeEncoding, OperandLayout,
    OPCODE_ENCODING_TABLE, REX_W,
};

/// Instruction decode pipeline with field extraction and validation.
pub mod decoder;
pub use decoder::{AddressingMode, Decoder, Immediate, Instruction, ModRm};

/// Fault taxonomy for decode and execute failures.
pub mod fault;
pub use fault::{
    DecodeFault, DecodeFaultReason, ExecuteFault, ExecuteFaultReason, Fault, FaultClass,
};

/// Instruction execution against the register file.
pub mod execute;
pub use execute::{ArithOp, Cpu, RegisterWrite, RESULT_OUT_OF_RANGE};

/// Hex text parsing and formatting.
pub mod hex;
pub use self::hex::{format_hex_compact, format_hex_spaced, parse_hex, HexParseError};

/// Public host-facing configuration and trace contract.
pub mod api;
pub use api::{CoreConfig, NoopTraceSink, TraceEvent, TraceSink};

/// Fetch/decode/execute driver.
pub mod run;
pub use run::{run, run_hex, step_one, RunError, RunReport};

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{disassemble, DisassemblyRow};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
