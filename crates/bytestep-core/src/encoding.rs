//! Opcode classification tables and instruction byte builders.
//!
//! The decoder consults [`OPCODE_ENCODING_TABLE`] to learn which operand bytes
//! follow an opcode; the builders at the bottom produce the same byte layouts
//! for generators and tests.

use crate::state::Register;

/// Primary opcode byte values of the supported instruction subset.
pub mod opcode {
    /// `ADD r/m64, r64`.
    pub const ADD_RM_REG: u8 = 0x01;
    /// `ADD RAX, imm32`.
    pub const ADD_ACC_IMM32: u8 = 0x05;
    /// `SUB r/m64, r64`.
    pub const SUB_RM_REG: u8 = 0x29;
    /// `SUB RAX, imm32`.
    pub const SUB_ACC_IMM32: u8 = 0x2D;
    /// `XOR r/m64, r64`.
    pub const XOR_RM_REG: u8 = 0x31;
    /// Group-1 `op r/m64, imm32`, operation chosen by the operand byte's reg field.
    pub const GROUP1_RM_IMM32: u8 = 0x81;
    /// `MOV r/m64, r64`.
    pub const MOV_RM_REG: u8 = 0x89;
    /// `MOV r64, r/m64`.
    pub const MOV_REG_RM: u8 = 0x8B;
    /// `MOV r, imm` base opcode; the low three bits select the register.
    pub const MOV_REG_IMM: u8 = 0xB8;
    /// `MOV r/m64, imm32` (sub-opcode 0 only).
    pub const MOV_RM_IMM32: u8 = 0xC7;
}

/// Group-1 sub-opcode selectors implemented by the engine.
pub mod group1 {
    /// `/0`: add.
    pub const ADD: u8 = 0;
    /// `/5`: subtract.
    pub const SUB: u8 = 5;
}

/// The widening prefix emitted by the builders (`REX.W`).
pub const REX_W: u8 = 0x48;

/// Top-two-bit pattern of an operand byte in direct-register addressing.
pub const MOD_DIRECT_REGISTER: u8 = 0b11;

/// Instruction forms of the supported opcode subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OpcodeEncoding {
    /// `B8+r`: load an immediate into the register encoded in the opcode.
    MovRegImm,
    /// `89`: r/m := reg.
    MovRmReg,
    /// `8B`: reg := r/m.
    MovRegRm,
    /// `01`: r/m += reg.
    AddRmReg,
    /// `29`: r/m -= reg.
    SubRmReg,
    /// `31`: r/m ^= reg.
    XorRmReg,
    /// `81`: r/m (+|-)= imm32 by sub-opcode.
    Group1RmImm32,
    /// `05`: RAX += imm32.
    AddAccImm32,
    /// `2D`: RAX -= imm32.
    SubAccImm32,
    /// `C7 /0`: r/m := imm32.
    MovRmImm32,
}

/// Immediate operand required by an instruction form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmediateLayout {
    /// No immediate.
    None,
    /// Always a 4-byte immediate.
    Imm32,
    /// A 4-byte immediate, or 8 bytes when a widening prefix precedes the opcode.
    Imm32OrImm64,
}

/// Bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandLayout {
    /// Whether an operand-encoding byte follows the opcode.
    pub modrm: bool,
    /// Which immediate follows the operand byte (if any).
    pub immediate: ImmediateLayout,
}

impl OpcodeEncoding {
    /// Operand bytes this form consumes after the opcode.
    #[must_use]
    pub const fn layout(self) -> OperandLayout {
        let (modrm, immediate) = match self {
            Self::MovRegImm => (false, ImmediateLayout::Imm32OrImm64),
            Self::MovRmReg | Self::MovRegRm | Self::AddRmReg | Self::SubRmReg | Self::XorRmReg => {
                (true, ImmediateLayout::None)
            }
            Self::Group1RmImm32 | Self::MovRmImm32 => (true, ImmediateLayout::Imm32),
            Self::AddAccImm32 | Self::SubAccImm32 => (false, ImmediateLayout::Imm32),
        };
        OperandLayout { modrm, immediate }
    }

    /// Whether the form is an add or subtract (register or immediate flavour).
    #[must_use]
    pub const fn is_calculation(self) -> bool {
        matches!(
            self,
            Self::AddRmReg
                | Self::SubRmReg
                | Self::Group1RmImm32
                | Self::AddAccImm32
                | Self::SubAccImm32
        )
    }
}

/// Single source-of-truth opcode table.
///
/// Any opcode not present here is illegal by definition. `B8..=BB` are the only
/// register-immediate loads because `BC..=BF` target unmodelled registers.
pub const OPCODE_ENCODING_TABLE: &[(u8, OpcodeEncoding)] = &[
    (opcode::ADD_RM_REG, OpcodeEncoding::AddRmReg),
    (opcode::ADD_ACC_IMM32, OpcodeEncoding::AddAccImm32),
    (opcode::SUB_RM_REG, OpcodeEncoding::SubRmReg),
    (opcode::SUB_ACC_IMM32, OpcodeEncoding::SubAccImm32),
    (opcode::XOR_RM_REG, OpcodeEncoding::XorRmReg),
    (opcode::GROUP1_RM_IMM32, OpcodeEncoding::Group1RmImm32),
    (opcode::MOV_RM_REG, OpcodeEncoding::MovRmReg),
    (opcode::MOV_REG_RM, OpcodeEncoding::MovRegRm),
    (0xB8, OpcodeEncoding::MovRegImm),
    (0xB9, OpcodeEncoding::MovRegImm),
    (0xBA, OpcodeEncoding::MovRegImm),
    (0xBB, OpcodeEncoding::MovRegImm),
    (opcode::MOV_RM_IMM32, OpcodeEncoding::MovRmImm32),
];

/// Returns true for bytes in the widening prefix range (`0x48..=0x4F`).
#[must_use]
pub const fn is_widening_prefix(byte: u8) -> bool {
    matches!(byte, 0x48..=0x4F)
}

/// Returns the instruction form for an opcode byte.
///
/// `None` means unknown/unsupported opcode.
#[must_use]
pub fn classify_opcode(op: u8) -> Option<OpcodeEncoding> {
    OPCODE_ENCODING_TABLE
        .iter()
        .find_map(|(entry_op, encoding)| (*entry_op == op).then_some(*encoding))
}

/// Builds a direct-register operand byte from a reg field and an r/m field.
#[must_use]
pub const fn modrm_direct(reg_field: u8, rm_field: u8) -> u8 {
    (MOD_DIRECT_REGISTER << 6) | ((reg_field & 0x07) << 3) | (rm_field & 0x07)
}

fn widened_rm_form(op: u8, reg_field: u8, dst: Register) -> Vec<u8> {
    vec![REX_W, op, modrm_direct(reg_field, dst.code())]
}

/// `MOV dst, imm32` (5 bytes, sign-extended on execution).
#[must_use]
pub fn encode_mov_imm32(dst: Register, imm: i32) -> Vec<u8> {
    let mut out = vec![opcode::MOV_REG_IMM + dst.code()];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `MOVABS dst, imm64` (10 bytes).
#[must_use]
pub fn encode_mov_imm64(dst: Register, imm: i64) -> Vec<u8> {
    let mut out = vec![REX_W, opcode::MOV_REG_IMM + dst.code()];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `MOV dst, src` using the `89` form.
#[must_use]
pub fn encode_mov_reg_reg(dst: Register, src: Register) -> Vec<u8> {
    widened_rm_form(opcode::MOV_RM_REG, src.code(), dst)
}

/// `ADD dst, src`.
#[must_use]
pub fn encode_add_reg_reg(dst: Register, src: Register) -> Vec<u8> {
    widened_rm_form(opcode::ADD_RM_REG, src.code(), dst)
}

/// `SUB dst, src`.
#[must_use]
pub fn encode_sub_reg_reg(dst: Register, src: Register) -> Vec<u8> {
    widened_rm_form(opcode::SUB_RM_REG, src.code(), dst)
}

/// `XOR dst, src`.
#[must_use]
pub fn encode_xor_reg_reg(dst: Register, src: Register) -> Vec<u8> {
    widened_rm_form(opcode::XOR_RM_REG, src.code(), dst)
}

/// `ADD dst, imm32` using group 1 (`48 81 /0`).
#[must_use]
pub fn encode_add_imm32(dst: Register, imm: i32) -> Vec<u8> {
    let mut out = widened_rm_form(opcode::GROUP1_RM_IMM32, group1::ADD, dst);
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `SUB dst, imm32` using group 1 (`48 81 /5`).
#[must_use]
pub fn encode_sub_imm32(dst: Register, imm: i32) -> Vec<u8> {
    let mut out = widened_rm_form(opcode::GROUP1_RM_IMM32, group1::SUB, dst);
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `ADD RAX, imm32` short form.
#[must_use]
pub fn encode_add_acc_imm32(imm: i32) -> Vec<u8> {
    let mut out = vec![opcode::ADD_ACC_IMM32];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `SUB RAX, imm32` short form.
#[must_use]
pub fn encode_sub_acc_imm32(imm: i32) -> Vec<u8> {
    let mut out = vec![opcode::SUB_ACC_IMM32];
    out.extend_from_slice(&imm.to_le_bytes());
    out
}

/// `MOV dst, imm32` using `48 C7 /0`.
#[must_use]
pub fn encode_mov_rm_imm32(dst: Register, imm: i32) -> Vec<u8> {
    let mut out = widened_rm_form(opcode::MOV_RM_IMM32, 0, dst);
    out.extend_from_slice(&imm.to_le_bytes());
    out
}
