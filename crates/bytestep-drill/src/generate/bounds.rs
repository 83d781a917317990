//! Immediate ranges that keep a register inside a width class.
//!
//! Both functions clamp to `bounds` as well, so the immediate itself never
//! lands in a wider class than the register it updates.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::level::WidthClass;

/// Immediates `imm` for which `current + imm` stays within `bounds`.
///
/// The range contains zero whenever `current` is inside `bounds`.
#[must_use]
pub fn add_immediate_range(current: i32, bounds: &RangeInclusive<i32>) -> RangeInclusive<i32> {
    let (min, max) = (*bounds.start(), *bounds.end());
    min.saturating_sub(current).max(min)..=max.saturating_sub(current).min(max)
}

/// Immediates `imm` for which `current - imm` stays within `bounds`.
///
/// The range contains zero whenever `current` is inside `bounds`.
#[must_use]
pub fn sub_immediate_range(current: i32, bounds: &RangeInclusive<i32>) -> RangeInclusive<i32> {
    let (min, max) = (*bounds.start(), *bounds.end());
    current.saturating_sub(max).max(min)..=current.saturating_sub(min).min(max)
}

/// Draws a value that belongs to `outer` but not to the narrower `inner` class.
pub fn sample_outside<R: Rng + ?Sized>(rng: &mut R, outer: WidthClass, inner: WidthClass) -> i32 {
    let (outer, inner) = (outer.bounds(), inner.bounds());
    if rng.gen_bool(0.5) {
        rng.gen_range(*outer.start()..*inner.start())
    } else {
        rng.gen_range(inner.end() + 1..=*outer.end())
    }
}
