//! Overflow-checked arithmetic used by the add/subtract forms.

use std::fmt;

use crate::fault::ExecuteFaultReason;

/// Signed arithmetic operation that can overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ArithOp {
    /// `lhs + rhs`.
    Add,
    /// `lhs - rhs`.
    Sub,
}

impl ArithOp {
    /// Applies the operation, returning `None` when the true result does not fit in `i64`.
    #[must_use]
    pub const fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
        }
    }

    /// Lowercase mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Applies `op`, mapping overflow to the execute fault reason.
pub(crate) fn checked(op: ArithOp, lhs: i64, rhs: i64) -> Result<i64, ExecuteFaultReason> {
    op.apply(lhs, rhs)
        .ok_or(ExecuteFaultReason::Overflow { operation: op })
}

#[cfg(test)]
mod tests {
    use super::{checked, ArithOp};
    use crate::fault::ExecuteFaultReason;

    #[test]
    fn add_overflow_in_both_directions() {
        assert_eq!(ArithOp::Add.apply(i64::MAX, 1), None);
        assert_eq!(ArithOp::Add.apply(i64::MIN, -1), None);
        assert_eq!(ArithOp::Add.apply(i64::MIN, i64::MIN), None);
        assert_eq!(ArithOp::Add.apply(i64::MAX, i64::MIN), Some(-1));
    }

    #[test]
    fn sub_overflow_in_both_directions() {
        assert_eq!(ArithOp::Sub.apply(i64::MIN, 1), None);
        assert_eq!(ArithOp::Sub.apply(i64::MAX, -1), None);
        assert_eq!(ArithOp::Sub.apply(0, i64::MIN), None);
        assert_eq!(ArithOp::Sub.apply(-1, i64::MIN), Some(i64::MAX));
    }

    #[test]
    fn checked_reports_the_failing_operation() {
        assert_eq!(
            checked(ArithOp::Sub, i64::MIN, 1),
            Err(ExecuteFaultReason::Overflow {
                operation: ArithOp::Sub
            })
        );
        assert_eq!(checked(ArithOp::Add, 40, 2), Ok(42));
    }
}
