//! Host-facing configuration and trace contracts.

use crate::decoder::Instruction;
use crate::fault::Fault;
use crate::state::RegisterFile;

/// Top-level configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Enables deterministic trace callback dispatch.
    pub tracing_enabled: bool,
}

impl CoreConfig {
    /// Configuration with trace dispatch switched on.
    #[must_use]
    pub const fn traced() -> Self {
        Self {
            tracing_enabled: true,
        }
    }
}

/// Deterministic trace stream emitted by the run driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An instruction left the decoder.
    InstructionDecoded {
        /// Offset of its first byte.
        offset: usize,
        /// Decoded record.
        instruction: Instruction,
    },
    /// An instruction was applied to the register file.
    InstructionRetired {
        /// Program counter of the retired instruction.
        pc: usize,
        /// Register file after commit.
        registers: RegisterFile,
    },
    /// The run stopped on a fault.
    Faulted {
        /// Terminal fault.
        fault: Fault,
    },
}

/// Host callback contract for deterministic trace emission.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
