use std::fmt;

/// Number of modelled general-purpose registers (`RAX`, `RBX`, `RCX`, `RDX`).
pub const REGISTER_COUNT: usize = 4;

/// Modelled 64-bit general-purpose register.
///
/// Only the four legacy accumulator-style registers exist. Stack, base, index
/// and the `R8..R15` extension registers are not part of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Register {
    /// Accumulator; implicit operand of the short add/sub forms and source of the result.
    Rax = 0,
    /// Base register.
    Rbx = 1,
    /// Counter register.
    Rcx = 2,
    /// Data register.
    Rdx = 3,
}

impl Register {
    /// Ordered list of all modelled registers.
    pub const ALL: [Self; REGISTER_COUNT] = [Self::Rax, Self::Rbx, Self::Rcx, Self::Rdx];

    /// Returns the register-file slot for this register (`0..=3`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 3-bit x86 register code.
    ///
    /// The mapping is the fixed hardware table (`0=RAX, 1=RCX, 2=RDX, 3=RBX`),
    /// not the slot order. Codes `4..=7` name registers that are not modelled.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Rax),
            1 => Some(Self::Rcx),
            2 => Some(Self::Rdx),
            3 => Some(Self::Rbx),
            _ => None,
        }
    }

    /// Returns the 3-bit x86 register code used in opcodes and operand bytes.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Rax => 0,
            Self::Rcx => 1,
            Self::Rdx => 2,
            Self::Rbx => 3,
        }
    }

    /// Lowercase assembler name of the register.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rax => "rax",
            Self::Rbx => "rbx",
            Self::Rcx => "rcx",
            Self::Rdx => "rdx",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Four independent signed 64-bit register slots, zero on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    values: [i64; REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads a register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> i64 {
        self.values[reg.index()]
    }

    /// Writes a register.
    pub const fn set(&mut self, reg: Register, value: i64) {
        self.values[reg.index()] = value;
    }

    /// Iterates `(register, value)` pairs in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (Register, i64)> + '_ {
        Register::ALL.iter().map(|reg| (*reg, self.get(*reg)))
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (reg, value) in self.entries() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={value}", reg.name().to_ascii_uppercase())?;
        }
        Ok(())
    }
}
