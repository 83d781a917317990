//! Instruction execution pipeline.
//!
//! Execution is split in two phases so faults are precise:
//! 1. [`Cpu::evaluate`] reads operands and computes the single register write,
//!    without touching state.
//! 2. [`Cpu::execute`] commits that write and advances `PC` by the instruction
//!    length, only when evaluation succeeded.

mod arith;

pub use arith::ArithOp;

use crate::decoder::{Instruction, ModRm};
use crate::encoding::{classify_opcode, group1, opcode, OpcodeEncoding};
use crate::fault::{ExecuteFault, ExecuteFaultReason};
use crate::state::{Register, RegisterFile};

/// Value [`Cpu::result_or_sentinel`] reports when `RAX` does not fit in `i32`.
pub const RESULT_OUT_OF_RANGE: i32 = -1;

/// The single register update an instruction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterWrite {
    /// Destination register.
    pub register: Register,
    /// New 64-bit value.
    pub value: i64,
}

/// Register file plus program counter for one execution session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cpu {
    registers: RegisterFile,
    pc: usize,
}

impl Cpu {
    /// Creates a CPU with all registers and `PC` at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Reads one register.
    #[must_use]
    pub const fn register(&self, reg: Register) -> i64 {
        self.registers.get(reg)
    }

    /// Writes one register directly (host-side seeding, not an instruction).
    pub const fn set_register(&mut self, reg: Register, value: i64) {
        self.registers.set(reg, value);
    }

    /// Byte offset of the next instruction in the executed stream.
    #[must_use]
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Session result: `RAX` narrowed to `i32`, or `None` when not representable.
    #[must_use]
    pub fn result(&self) -> Option<i32> {
        i32::try_from(self.register(Register::Rax)).ok()
    }

    /// Session result with [`RESULT_OUT_OF_RANGE`] standing in for "not representable".
    #[must_use]
    pub fn result_or_sentinel(&self) -> i32 {
        self.result().unwrap_or(RESULT_OUT_OF_RANGE)
    }

    /// Applies one instruction.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecuteFault`] at the current `PC` on signed overflow, an
    /// unsupported sub-opcode, an unmodelled register code, or an opcode the
    /// engine does not know. A faulting instruction leaves registers and `PC`
    /// unchanged.
    pub fn execute(&mut self, instr: &Instruction) -> Result<RegisterWrite, ExecuteFault> {
        let write = self
            .evaluate(instr)
            .map_err(|reason| ExecuteFault::new(self.pc, reason))?;
        self.registers.set(write.register, write.value);
        self.pc += instr.length;
        Ok(write)
    }

    /// Computes the register write `instr` would perform, without side effects.
    ///
    /// # Errors
    ///
    /// Returns the reason the instruction cannot be applied.
    pub fn evaluate(&self, instr: &Instruction) -> Result<RegisterWrite, ExecuteFaultReason> {
        let op = instr.opcode;
        let Some(encoding) = classify_opcode(op) else {
            return Err(ExecuteFaultReason::UnknownOpcode(op));
        };

        match encoding {
            OpcodeEncoding::MovRegImm => {
                let register = register_from_code(op - opcode::MOV_REG_IMM)?;
                let value = instr
                    .immediate
                    .ok_or(ExecuteFaultReason::MalformedInstruction(op))?
                    .value();
                Ok(RegisterWrite { register, value })
            }
            OpcodeEncoding::MovRmReg => {
                let modrm = required_modrm(instr)?;
                let src = register_from_code(modrm.reg_field())?;
                let dst = register_from_code(modrm.rm_field())?;
                Ok(self.copy(dst, src))
            }
            OpcodeEncoding::MovRegRm => {
                let modrm = required_modrm(instr)?;
                let src = register_from_code(modrm.rm_field())?;
                let dst = register_from_code(modrm.reg_field())?;
                Ok(self.copy(dst, src))
            }
            OpcodeEncoding::AddRmReg => self.arith_reg_reg(instr, ArithOp::Add),
            OpcodeEncoding::SubRmReg => self.arith_reg_reg(instr, ArithOp::Sub),
            OpcodeEncoding::XorRmReg => {
                let modrm = required_modrm(instr)?;
                let src = register_from_code(modrm.reg_field())?;
                let dst = register_from_code(modrm.rm_field())?;
                Ok(RegisterWrite {
                    register: dst,
                    value: self.register(dst) ^ self.register(src),
                })
            }
            OpcodeEncoding::Group1RmImm32 => {
                let modrm = required_modrm(instr)?;
                let dst = register_from_code(modrm.rm_field())?;
                let arith = match modrm.reg_field() {
                    group1::ADD => ArithOp::Add,
                    group1::SUB => ArithOp::Sub,
                    selector => {
                        return Err(ExecuteFaultReason::UnsupportedSubOpcode {
                            opcode: op,
                            selector,
                        })
                    }
                };
                self.arith_imm(dst, arith, required_imm32(instr)?)
            }
            OpcodeEncoding::AddAccImm32 => {
                self.arith_imm(Register::Rax, ArithOp::Add, required_imm32(instr)?)
            }
            OpcodeEncoding::SubAccImm32 => {
                self.arith_imm(Register::Rax, ArithOp::Sub, required_imm32(instr)?)
            }
            OpcodeEncoding::MovRmImm32 => {
                let modrm = required_modrm(instr)?;
                if modrm.reg_field() != 0 {
                    return Err(ExecuteFaultReason::UnsupportedSubOpcode {
                        opcode: op,
                        selector: modrm.reg_field(),
                    });
                }
                let register = register_from_code(modrm.rm_field())?;
                Ok(RegisterWrite {
                    register,
                    value: required_imm32(instr)?,
                })
            }
        }
    }

    const fn copy(&self, dst: Register, src: Register) -> RegisterWrite {
        RegisterWrite {
            register: dst,
            value: self.register(src),
        }
    }

    fn arith_reg_reg(
        &self,
        instr: &Instruction,
        arith: ArithOp,
    ) -> Result<RegisterWrite, ExecuteFaultReason> {
        let modrm = required_modrm(instr)?;
        let src = register_from_code(modrm.reg_field())?;
        let dst = register_from_code(modrm.rm_field())?;
        self.arith_imm(dst, arith, self.register(src))
    }

    fn arith_imm(
        &self,
        dst: Register,
        arith: ArithOp,
        rhs: i64,
    ) -> Result<RegisterWrite, ExecuteFaultReason> {
        Ok(RegisterWrite {
            register: dst,
            value: arith::checked(arith, self.register(dst), rhs)?,
        })
    }
}

const fn register_from_code(code: u8) -> Result<Register, ExecuteFaultReason> {
    match Register::from_code(code) {
        Some(reg) => Ok(reg),
        None => Err(ExecuteFaultReason::UnsupportedRegister { code }),
    }
}

const fn required_modrm(instr: &Instruction) -> Result<ModRm, ExecuteFaultReason> {
    match instr.modrm {
        Some(modrm) => Ok(modrm),
        None => Err(ExecuteFaultReason::MalformedInstruction(instr.opcode)),
    }
}

fn required_imm32(instr: &Instruction) -> Result<i64, ExecuteFaultReason> {
    instr
        .imm32()
        .map(i64::from)
        .ok_or(ExecuteFaultReason::MalformedInstruction(instr.opcode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;

    fn decode(code: &[u8]) -> Instruction {
        Decoder::new(code).decode_next().expect("bytes must decode")
    }

    #[test]
    fn mov_imm32_sign_extends() {
        let mut cpu = Cpu::new();
        cpu.execute(&decode(&[0xB9, 0xFF, 0xFF, 0xFF, 0xFF]))
            .expect("mov rcx, -1");
        assert_eq!(cpu.register(Register::Rcx), -1);
        assert_eq!(cpu.pc(), 5);
    }

    #[test]
    fn widened_mov_loads_raw_imm64() {
        let mut cpu = Cpu::new();
        let code = [0x48, 0xBA, 0, 0, 0, 0, 0, 0, 0, 0x80];
        cpu.execute(&decode(&code)).expect("movabs rdx");
        assert_eq!(cpu.register(Register::Rdx), i64::MIN);
        assert_eq!(cpu.pc(), 10);
    }

    #[test]
    fn both_move_directions_copy_the_source() {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::Rax, 7);

        cpu.execute(&decode(&[0x48, 0x89, 0xC3])).expect("mov rbx, rax");
        assert_eq!(cpu.register(Register::Rbx), 7);

        cpu.execute(&decode(&[0x48, 0x8B, 0xD0])).expect("mov rdx, rax");
        assert_eq!(cpu.register(Register::Rdx), 7);
        assert_eq!(cpu.register(Register::Rax), 7);
    }

    #[test]
    fn xor_self_clears_register() {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::Rcx, 0x1234);
        cpu.execute(&decode(&[0x48, 0x31, 0xC9])).expect("xor rcx, rcx");
        assert_eq!(cpu.register(Register::Rcx), 0);
    }

    #[test]
    fn accumulator_forms_target_rax() {
        let mut cpu = Cpu::new();
        cpu.execute(&decode(&[0x05, 0x0A, 0, 0, 0])).expect("add rax, 10");
        cpu.execute(&decode(&[0x2D, 0x03, 0, 0, 0])).expect("sub rax, 3");
        assert_eq!(cpu.register(Register::Rax), 7);
        assert_eq!(cpu.pc(), 10);
    }

    #[test]
    fn group1_rejects_unimplemented_selectors() {
        let mut cpu = Cpu::new();
        // 48 81 C8 = or rax, imm32
        let instr = decode(&[0x48, 0x81, 0xC8, 1, 0, 0, 0]);
        let fault = cpu.execute(&instr).expect_err("selector 1 is not implemented");
        assert_eq!(
            fault,
            ExecuteFault::new(
                0,
                ExecuteFaultReason::UnsupportedSubOpcode {
                    opcode: 0x81,
                    selector: 1
                }
            )
        );
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn mov_rm_imm32_overwrites_without_overflow_check() {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::Rbx, i64::MAX);
        cpu.execute(&decode(&[0x48, 0xC7, 0xC3, 0x00, 0x00, 0x00, 0x80]))
            .expect("mov rbx, imm32");
        assert_eq!(cpu.register(Register::Rbx), i64::from(i32::MIN));

        let fault = cpu
            .execute(&decode(&[0x48, 0xC7, 0xCB, 0, 0, 0, 0]))
            .expect_err("sub-opcode 1");
        assert!(matches!(
            fault.reason,
            ExecuteFaultReason::UnsupportedSubOpcode { opcode: 0xC7, .. }
        ));
    }

    #[test]
    fn unmodelled_register_code_faults() {
        let mut cpu = Cpu::new();
        // 48 89 E0 = mov rax, rsp
        let fault = cpu
            .execute(&decode(&[0x48, 0x89, 0xE0]))
            .expect_err("rsp is not modelled");
        assert_eq!(fault.reason, ExecuteFaultReason::UnsupportedRegister { code: 4 });
    }

    #[test]
    fn hand_built_unknown_opcode_faults_defensively() {
        let mut cpu = Cpu::new();
        let instr = Instruction {
            prefix: None,
            opcode: 0x90,
            modrm: None,
            immediate: None,
            length: 1,
        };
        let fault = cpu.execute(&instr).expect_err("nop is not supported");
        assert_eq!(fault.reason, ExecuteFaultReason::UnknownOpcode(0x90));
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn hand_built_record_without_operands_is_malformed() {
        let cpu = Cpu::new();
        let instr = Instruction {
            prefix: Some(0x48),
            opcode: 0x01,
            modrm: None,
            immediate: None,
            length: 2,
        };
        assert_eq!(
            cpu.evaluate(&instr),
            Err(ExecuteFaultReason::MalformedInstruction(0x01))
        );
    }

    #[test]
    fn overflow_leaves_destination_and_pc_untouched() {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::Rax, i64::MAX);
        cpu.set_register(Register::Rbx, 1);

        let fault = cpu
            .execute(&decode(&[0x48, 0x01, 0xD8]))
            .expect_err("add rax, rbx overflows");
        assert!(fault.is_overflow());
        assert_eq!(fault.pc, 0);
        assert_eq!(cpu.register(Register::Rax), i64::MAX);
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn result_uses_sentinel_outside_i32() {
        let mut cpu = Cpu::new();
        cpu.set_register(Register::Rax, -5);
        assert_eq!(cpu.result(), Some(-5));

        cpu.set_register(Register::Rax, i64::from(i32::MAX) + 1);
        assert_eq!(cpu.result(), None);
        assert_eq!(cpu.result_or_sentinel(), RESULT_OUT_OF_RANGE);

        cpu.set_register(Register::Rax, i64::from(i32::MIN));
        assert_eq!(cpu.result(), Some(i32::MIN));
    }
}
