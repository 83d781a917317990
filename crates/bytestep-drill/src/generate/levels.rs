//! Per-level program shapes.

use bytestep_core::{
    encode_add_imm32, encode_add_reg_reg, encode_mov_imm32, encode_sub_imm32, encode_sub_reg_reg,
    ArithOp, Register, REGISTER_COUNT,
};
use rand::seq::SliceRandom;
use rand::Rng;

use super::bounds::{add_immediate_range, sample_outside, sub_immediate_range};
use crate::level::WidthClass;

/// `mov rax, init` followed by one bounded `add`/`sub rax, imm32`.
///
/// `init` is drawn so its own width class is exactly `class`, which fixes the
/// classification regardless of the immediate picked.
pub(super) fn single_register<R: Rng + ?Sized>(rng: &mut R, class: WidthClass) -> Vec<u8> {
    let init = match class {
        WidthClass::Byte => rng.gen_range(class.bounds()),
        WidthClass::Word => sample_outside(rng, WidthClass::Word, WidthClass::Byte),
        WidthClass::Dword => sample_outside(rng, WidthClass::Dword, WidthClass::Word),
    };

    let mut code = encode_mov_imm32(Register::Rax, init);
    let (op, _) = bounded_immediate_step(rng, init, &mut code, Register::Rax, class);
    tracing::trace!(init, %op, "single-register step");
    code
}

/// Four register loads followed by two or three calculations.
pub(super) fn multi_register<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let mut values = [0_i32; REGISTER_COUNT];
    let mut code = Vec::new();

    for reg in Register::ALL {
        let value = if reg == Register::Rax {
            sample_outside(rng, WidthClass::Dword, WidthClass::Word)
        } else {
            rng.gen()
        };
        values[reg.index()] = value;
        code.extend(encode_mov_imm32(reg, value));
    }

    for _ in 0..rng.gen_range(2..=3) {
        let dst = Register::ALL[rng.gen_range(0..REGISTER_COUNT)];
        let current = values[dst.index()];

        let register_option = if rng.gen_bool(0.5) {
            register_candidates(&values, current).choose(rng).copied()
        } else {
            None
        };

        let Some((op, src, result)) = register_option else {
            values[dst.index()] =
                bounded_immediate_step(rng, current, &mut code, dst, WidthClass::Dword).1;
            continue;
        };
        code.extend(match op {
            ArithOp::Add => encode_add_reg_reg(dst, src),
            ArithOp::Sub => encode_sub_reg_reg(dst, src),
        });
        values[dst.index()] = result;
    }

    code
}

/// Register-register operations on a destination holding `current` whose
/// result stays within `i32`.
fn register_candidates(
    values: &[i32; REGISTER_COUNT],
    current: i32,
) -> Vec<(ArithOp, Register, i32)> {
    Register::ALL
        .into_iter()
        .flat_map(|src| [(ArithOp::Add, src), (ArithOp::Sub, src)])
        .filter_map(|(op, src)| {
            let rhs = i64::from(values[src.index()]);
            let result = op.apply(i64::from(current), rhs)?;
            i32::try_from(result).ok().map(|result| (op, src, result))
        })
        .collect()
}

/// Appends a random `add`/`sub dst, imm32` that keeps `dst` inside `class`.
fn bounded_immediate_step<R: Rng + ?Sized>(
    rng: &mut R,
    current: i32,
    code: &mut Vec<u8>,
    dst: Register,
    class: WidthClass,
) -> (ArithOp, i32) {
    let bounds = class.bounds();
    if rng.gen_bool(0.5) {
        let imm = rng.gen_range(add_immediate_range(current, &bounds));
        code.extend(encode_add_imm32(dst, imm));
        (ArithOp::Add, current + imm)
    } else {
        let imm = rng.gen_range(sub_immediate_range(current, &bounds));
        code.extend(encode_sub_imm32(dst, imm));
        (ArithOp::Sub, current - imm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracting_a_register_from_itself_is_always_a_candidate() {
        let values = [i32::MAX, i32::MIN, i32::MIN, i32::MAX];
        let candidates = register_candidates(&values, i32::MIN);
        assert!(candidates.contains(&(ArithOp::Sub, Register::Rbx, 0)));
        assert!(candidates.contains(&(ArithOp::Add, Register::Rax, -1)));
        assert!(!candidates
            .iter()
            .any(|&(op, src, _)| op == ArithOp::Add && src == Register::Rcx));
    }
}
