//! Instruction disassembly for the supported x86-64 subset.
//!
//! Rows use Intel operand order (destination first) and always name the
//! 64-bit registers, since the engine models full-width registers only.

use std::fmt;

use crate::decoder::{Decoder, Instruction, ModRm};
use crate::encoding::{classify_opcode, opcode, OpcodeEncoding};
use crate::hex::format_hex_spaced;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const REGISTER_NAMES: [&str; 8] = ["rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi"];

const GROUP1_MNEMONICS: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Offset of the first byte of the instruction.
    pub offset: usize,
    /// Raw bytes covered by this row.
    pub bytes: Vec<u8>,
    /// The instruction mnemonic (e.g. "mov", "add", "movabs").
    pub mnemonic: String,
    /// The formatted operands (e.g. "rbx, rax" or "rax, 0x2a").
    pub operands: String,
    /// Whether this row covers bytes that do not form a usable instruction.
    pub is_illegal: bool,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>4x}:  {:<30} {}",
            self.offset,
            format_hex_spaced(&self.bytes),
            self.mnemonic
        )?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Disassembles `code` from offset zero.
///
/// Decoding stops at the first fault; the remaining bytes are reported as a
/// single illegal `(bad)` row whose operands carry the fault reason.
#[must_use]
pub fn disassemble(code: &[u8]) -> Vec<DisassemblyRow> {
    let mut decoder = Decoder::new(code);
    let mut rows = Vec::new();

    while decoder.has_more() {
        let offset = decoder.position();
        match decoder.decode_next() {
            Ok(instr) => rows.push(row_for(offset, &code[offset..offset + instr.length], &instr)),
            Err(fault) => {
                rows.push(DisassemblyRow {
                    offset,
                    bytes: code[offset..].to_vec(),
                    mnemonic: "(bad)".to_string(),
                    operands: fault.reason.to_string(),
                    is_illegal: true,
                });
                break;
            }
        }
    }

    rows
}

fn row_for(offset: usize, bytes: &[u8], instr: &Instruction) -> DisassemblyRow {
    let (mnemonic, operands) = format_instruction(instr);
    let is_illegal = mnemonic == "(bad)";
    DisassemblyRow {
        offset,
        bytes: bytes.to_vec(),
        mnemonic: mnemonic.to_string(),
        operands,
        is_illegal,
    }
}

fn format_instruction(instr: &Instruction) -> (&'static str, String) {
    let Some(encoding) = classify_opcode(instr.opcode) else {
        return ("(bad)", String::new());
    };
    let imm = instr.immediate.map(|imm| imm.value()).unwrap_or_default();

    match (encoding, instr.modrm) {
        (OpcodeEncoding::MovRegImm, _) => {
            let dst = register_name(instr.opcode - opcode::MOV_REG_IMM);
            let mnemonic = if instr.imm64().is_some() { "movabs" } else { "mov" };
            (mnemonic, format!("{dst}, {}", format_immediate(imm)))
        }
        (OpcodeEncoding::MovRmReg, Some(modrm)) => ("mov", rm_then_reg(modrm)),
        (OpcodeEncoding::MovRegRm, Some(modrm)) => (
            "mov",
            format!(
                "{}, {}",
                register_name(modrm.reg_field()),
                register_name(modrm.rm_field())
            ),
        ),
        (OpcodeEncoding::AddRmReg, Some(modrm)) => ("add", rm_then_reg(modrm)),
        (OpcodeEncoding::SubRmReg, Some(modrm)) => ("sub", rm_then_reg(modrm)),
        (OpcodeEncoding::XorRmReg, Some(modrm)) => ("xor", rm_then_reg(modrm)),
        (OpcodeEncoding::Group1RmImm32, Some(modrm)) => (
            GROUP1_MNEMONICS[usize::from(modrm.reg_field())],
            rm_then_imm(modrm, imm),
        ),
        (OpcodeEncoding::AddAccImm32, _) => ("add", format!("rax, {}", format_immediate(imm))),
        (OpcodeEncoding::SubAccImm32, _) => ("sub", format!("rax, {}", format_immediate(imm))),
        (OpcodeEncoding::MovRmImm32, Some(modrm)) if modrm.reg_field() == 0 => {
            ("mov", rm_then_imm(modrm, imm))
        }
        _ => ("(bad)", String::new()),
    }
}

fn rm_then_reg(modrm: ModRm) -> String {
    format!(
        "{}, {}",
        register_name(modrm.rm_field()),
        register_name(modrm.reg_field())
    )
}

fn rm_then_imm(modrm: ModRm, imm: i64) -> String {
    format!(
        "{}, {}",
        register_name(modrm.rm_field()),
        format_immediate(imm)
    )
}

fn register_name(code: u8) -> &'static str {
    REGISTER_NAMES[usize::from(code & 0x07)]
}

fn format_immediate(value: i64) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{value:#x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(code: &[u8]) -> DisassemblyRow {
        let rows = disassemble(code);
        assert_eq!(rows.len(), 1, "expected one row for {code:02x?}");
        rows.into_iter().next().expect("one row")
    }

    #[test]
    fn disassemble_mov_imm32() {
        let row = single(&[0xB8, 0x2A, 0x00, 0x00, 0x00]);
        assert_eq!(row.mnemonic, "mov");
        assert_eq!(row.operands, "rax, 0x2a");
        assert!(!row.is_illegal);
    }

    #[test]
    fn disassemble_movabs_negative() {
        let mut code = vec![0x48, 0xBB];
        code.extend_from_slice(&(-2_i64).to_le_bytes());
        let row = single(&code);
        assert_eq!(row.mnemonic, "movabs");
        assert_eq!(row.operands, "rbx, -0x2");
        assert_eq!(row.bytes.len(), 10);
    }

    #[test]
    fn disassemble_register_forms_put_destination_first() {
        assert_eq!(single(&[0x48, 0x89, 0xC3]).operands, "rbx, rax");
        assert_eq!(single(&[0x48, 0x8B, 0xC3]).operands, "rax, rbx");
        assert_eq!(single(&[0x48, 0x29, 0xD8]).mnemonic, "sub");
        assert_eq!(single(&[0x48, 0x31, 0xC0]).operands, "rax, rax");
    }

    #[test]
    fn disassemble_group1_uses_selector_name() {
        let row = single(&[0x48, 0x81, 0xE9, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(row.mnemonic, "sub");
        assert_eq!(row.operands, "rcx, 0x10");

        let row = single(&[0x48, 0x81, 0xF8, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(row.mnemonic, "cmp");
        assert!(!row.is_illegal);
    }

    #[test]
    fn c7_with_nonzero_selector_is_bad() {
        let row = single(&[0xC7, 0xC8, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(row.mnemonic, "(bad)");
        assert!(row.is_illegal);
    }

    #[test]
    fn decode_fault_consumes_the_tail() {
        let rows = disassemble(&[0xB8, 0x01, 0x00, 0x00, 0x00, 0x90, 0x90]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].offset, 5);
        assert_eq!(rows[1].bytes, vec![0x90, 0x90]);
        assert_eq!(rows[1].mnemonic, "(bad)");
        assert_eq!(rows[1].operands, "unknown opcode 0x90");
        assert!(rows[1].is_illegal);
    }

    #[test]
    fn row_display_lists_offset_bytes_and_text() {
        let row = single(&[0x05, 0xFF, 0xFF, 0xFF, 0xFF]);
        let text = row.to_string();
        assert!(text.starts_with("   0:  05 ff ff ff ff"));
        assert!(text.ends_with("add rax, -0x1"));
    }
}
