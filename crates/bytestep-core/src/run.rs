//! Run driver: pulls instructions from a [`Decoder`] and hands them to a [`Cpu`].

use thiserror::Error;

use crate::api::{CoreConfig, TraceEvent, TraceSink};
use crate::decoder::{Decoder, Instruction};
use crate::execute::Cpu;
use crate::fault::Fault;
use crate::hex::{parse_hex, HexParseError};
use crate::state::RegisterFile;

/// Outcome of a run that consumed the whole buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunReport {
    /// Final register file.
    pub registers: RegisterFile,
    /// Final program counter (equals the program length).
    pub pc: usize,
    /// Instructions retired.
    pub instructions: usize,
    /// `RAX` as `i32`, or `None` when not representable.
    pub result: Option<i32>,
}

/// Any failure of [`run_hex`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Input text was not valid hex.
    #[error("error parsing hex input: {0}")]
    Hex(#[from] HexParseError),
    /// Decoding or execution faulted.
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Decodes and executes exactly one instruction.
///
/// Returns `Ok(None)` once the decoder is exhausted.
///
/// # Errors
///
/// Returns the decode or execute fault that stopped the step.
pub fn step_one(cpu: &mut Cpu, decoder: &mut Decoder<'_>) -> Result<Option<Instruction>, Fault> {
    if !decoder.has_more() {
        return Ok(None);
    }
    let instruction = decoder.decode_next()?;
    cpu.execute(&instruction)?;
    Ok(Some(instruction))
}

/// Runs `code` on `cpu` until the buffer is exhausted or a fault occurs.
///
/// The CPU is mutated in place, so after an error it still shows the state
/// immediately before the faulting instruction.
///
/// # Errors
///
/// Returns the first decode or execute fault.
pub fn run(
    cpu: &mut Cpu,
    code: &[u8],
    config: &CoreConfig,
    sink: &mut dyn TraceSink,
) -> Result<RunReport, Fault> {
    let mut decoder = Decoder::new(code);
    let mut instructions = 0;

    while decoder.has_more() {
        let offset = decoder.position();
        if let Err(fault) = run_step(cpu, &mut decoder, offset, config, sink) {
            tracing::debug!(%fault, position = fault.position(), "run stopped on fault");
            if config.tracing_enabled {
                sink.on_event(TraceEvent::Faulted { fault });
            }
            return Err(fault);
        }
        instructions += 1;
    }

    Ok(RunReport {
        registers: *cpu.registers(),
        pc: cpu.pc(),
        instructions,
        result: cpu.result(),
    })
}

fn run_step(
    cpu: &mut Cpu,
    decoder: &mut Decoder<'_>,
    offset: usize,
    config: &CoreConfig,
    sink: &mut dyn TraceSink,
) -> Result<(), Fault> {
    let instruction = decoder.decode_next()?;
    if config.tracing_enabled {
        sink.on_event(TraceEvent::InstructionDecoded {
            offset,
            instruction,
        });
    }

    let pc = cpu.pc();
    let write = cpu.execute(&instruction)?;
    tracing::trace!(
        pc,
        opcode = instruction.opcode,
        register = %write.register,
        value = write.value,
        "retired instruction"
    );
    if config.tracing_enabled {
        sink.on_event(TraceEvent::InstructionRetired {
            pc,
            registers: *cpu.registers(),
        });
    }
    Ok(())
}

/// Parses hex text and runs it on `cpu`.
///
/// # Errors
///
/// Returns [`RunError::Hex`] for malformed text and [`RunError::Fault`] for
/// the first decode or execute fault.
pub fn run_hex(
    cpu: &mut Cpu,
    text: &str,
    config: &CoreConfig,
    sink: &mut dyn TraceSink,
) -> Result<RunReport, RunError> {
    let code = parse_hex(text)?;
    Ok(run(cpu, &code, config, sink)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoopTraceSink;
    use crate::fault::{DecodeFaultReason, FaultClass};
    use crate::state::Register;

    #[test]
    fn step_one_reports_exhaustion() {
        let code = [0xB8, 0x01, 0x00, 0x00, 0x00];
        let mut cpu = Cpu::new();
        let mut decoder = Decoder::new(&code);

        let first = step_one(&mut cpu, &mut decoder).expect("valid step");
        assert_eq!(first.map(|instr| instr.length), Some(5));
        assert_eq!(step_one(&mut cpu, &mut decoder), Ok(None));
        assert_eq!(cpu.pc(), 5);
    }

    #[test]
    fn run_reports_final_state() {
        let mut cpu = Cpu::new();
        let report = run_hex(
            &mut cpu,
            "b8 05 00 00 00 48 89 c1 48 01 c8",
            &CoreConfig::default(),
            &mut NoopTraceSink,
        )
        .expect("program runs");

        assert_eq!(report.instructions, 3);
        assert_eq!(report.pc, 11);
        assert_eq!(report.registers.get(Register::Rcx), 5);
        assert_eq!(report.result, Some(10));
    }

    #[test]
    fn traced_run_emits_decode_and_retire_pairs() {
        let mut cpu = Cpu::new();
        let mut events = Vec::new();
        run(
            &mut cpu,
            &[0xB8, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x00, 0x00, 0x00],
            &CoreConfig::traced(),
            &mut events,
        )
        .expect("program runs");

        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[2],
            TraceEvent::InstructionDecoded { offset: 5, .. }
        ));
        assert!(matches!(
            events[3],
            TraceEvent::InstructionRetired { pc: 5, .. }
        ));
    }

    #[test]
    fn untraced_run_stays_silent() {
        let mut cpu = Cpu::new();
        let mut events = Vec::new();
        let _ = run(&mut cpu, &[0x90], &CoreConfig::default(), &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn decode_fault_is_traced_and_returned() {
        let mut cpu = Cpu::new();
        let mut events = Vec::new();
        let fault = run(
            &mut cpu,
            &[0x05, 0x01, 0x00, 0x00, 0x00, 0x48, 0x01, 0x00],
            &CoreConfig::traced(),
            &mut events,
        )
        .expect_err("memory operand");

        assert_eq!(fault.class(), FaultClass::Decode);
        assert_eq!(fault.position(), 7);
        assert!(matches!(
            fault,
            Fault::Decode(decode) if matches!(decode.reason, DecodeFaultReason::UnsupportedAddressingMode { .. })
        ));
        assert!(matches!(events.last(), Some(TraceEvent::Faulted { .. })));
        assert_eq!(cpu.register(Register::Rax), 1);
        assert_eq!(cpu.pc(), 5);
    }

    #[test]
    fn bad_hex_never_reaches_the_cpu() {
        let mut cpu = Cpu::new();
        let err = run_hex(&mut cpu, "b8 0", &CoreConfig::default(), &mut NoopTraceSink)
            .expect_err("odd length");
        assert!(matches!(err, RunError::Hex(HexParseError::OddLength { len: 3 })));
    }
}
