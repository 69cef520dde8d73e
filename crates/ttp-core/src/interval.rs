//! Interval domain over non-negative integers.
//!
//! Every numeric quantity in a pattern (widths, bounds, masks, variable
//! domains) evaluates to a [`ValueRange`]. Arithmetic is checked: a result
//! that would leave `0..=u128::MAX` is an [`EvalError`], never a wrapped
//! value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::EvalError;

/// A closed range `[lo, hi]`. `hi == None` means unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    pub lo: u128,
    pub hi: Option<u128>,
}

impl ValueRange {
    /// Every non-negative value.
    pub fn unbounded() -> Self {
        Self { lo: 0, hi: None }
    }

    /// A point range [v, v].
    pub fn point(v: u128) -> Self {
        Self { lo: v, hi: Some(v) }
    }

    /// A bounded range [lo, hi].
    pub fn bounded(lo: u128, hi: u128) -> Self {
        Self { lo, hi: Some(hi) }
    }

    /// All values representable in `width` bits.
    pub fn of_width(width: u32) -> Self {
        Self::bounded(0, width_max(width))
    }

    /// The single value, if this range is a point.
    pub fn as_point(&self) -> Option<u128> {
        match self.hi {
            Some(hi) if hi == self.lo => Some(hi),
            _ => None,
        }
    }

    /// True when `lo > hi`.
    pub fn is_empty(&self) -> bool {
        matches!(self.hi, Some(hi) if self.lo > hi)
    }

    pub fn contains(&self, v: u128) -> bool {
        v >= self.lo && self.hi.map_or(true, |hi| v <= hi)
    }

    /// True when every value of `other` lies in `self`.
    pub fn covers(&self, other: &ValueRange) -> bool {
        if other.lo < self.lo {
            return false;
        }
        match (self.hi, other.hi) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => b <= a,
        }
    }

    /// Add two ranges: [a,b] + [c,d] = [a+c, b+d].
    pub fn add(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        let lo = self.lo.checked_add(other.lo).ok_or(EvalError::Overflow)?;
        let hi = match (self.hi, other.hi) {
            (Some(b), Some(d)) => Some(b.checked_add(d).ok_or(EvalError::Overflow)?),
            _ => None,
        };
        Ok(ValueRange { lo, hi })
    }

    /// Subtract two ranges: [a,b] - [c,d] = [a-d, b-c].
    ///
    /// Any possibly negative result is an error.
    pub fn sub(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        let d = other.hi.ok_or(EvalError::Negative)?;
        let lo = self.lo.checked_sub(d).ok_or(EvalError::Negative)?;
        let hi = match self.hi {
            Some(b) => Some(b.checked_sub(other.lo).ok_or(EvalError::Negative)?),
            None => None,
        };
        Ok(ValueRange { lo, hi })
    }

    /// Multiply two ranges. Both operands are non-negative so the corners
    /// are `lo*lo` and `hi*hi`.
    pub fn mul(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        let lo = self.lo.checked_mul(other.lo).ok_or(EvalError::Overflow)?;
        let hi = match (self.hi, other.hi) {
            (Some(b), Some(d)) => Some(b.checked_mul(d).ok_or(EvalError::Overflow)?),
            // 0 * unbounded stays 0
            (Some(0), None) | (None, Some(0)) => Some(0),
            _ => None,
        };
        Ok(ValueRange { lo, hi })
    }

    /// Integer division. A divisor range containing zero is an error.
    pub fn div(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        if other.lo == 0 {
            return Err(EvalError::DivideByZero);
        }
        let lo = match other.hi {
            Some(d) => self.lo / d,
            None => 0,
        };
        let hi = self.hi.map(|b| b / other.lo);
        Ok(ValueRange { lo, hi })
    }

    /// Remainder. Exact for points, otherwise `[0, min(b, d-1)]`.
    pub fn rem(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        if other.lo == 0 {
            return Err(EvalError::DivideByZero);
        }
        if let (Some(a), Some(c)) = (self.as_point(), other.as_point()) {
            return Ok(ValueRange::point(a % c));
        }
        let hi = match (self.hi, other.hi) {
            (Some(b), Some(d)) => Some(b.min(d - 1)),
            (Some(b), None) => Some(b),
            (None, Some(d)) => Some(d - 1),
            (None, None) => None,
        };
        Ok(ValueRange { lo: 0, hi })
    }

    /// Left shift. Shifting a set bit past bit 127 is an overflow.
    pub fn shl(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        let lo = checked_shl(self.lo, other.lo)?;
        let hi = match (self.hi, other.hi) {
            (Some(0), _) => Some(0),
            (Some(b), Some(d)) => Some(checked_shl(b, d)?),
            _ => None,
        };
        Ok(ValueRange { lo, hi })
    }

    /// Right shift.
    pub fn shr(&self, other: &ValueRange) -> Result<ValueRange, EvalError> {
        let lo = match other.hi {
            Some(d) => shr_saturating(self.lo, d),
            None => 0,
        };
        let hi = self.hi.map(|b| shr_saturating(b, other.lo));
        Ok(ValueRange { lo, hi })
    }

    /// Bitwise AND. Exact for points, otherwise bounded by the smaller top.
    pub fn and(&self, other: &ValueRange) -> ValueRange {
        if let (Some(a), Some(c)) = (self.as_point(), other.as_point()) {
            return ValueRange::point(a & c);
        }
        let hi = match (self.hi, other.hi) {
            (Some(b), Some(d)) => Some(b.min(d)),
            (Some(b), None) => Some(b),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        };
        ValueRange { lo: 0, hi }
    }

    /// Bitwise OR or XOR. Exact for points, otherwise bounded by the
    /// all-ones value covering both tops.
    pub fn or_xor(&self, other: &ValueRange, xor: bool) -> ValueRange {
        if let (Some(a), Some(c)) = (self.as_point(), other.as_point()) {
            return ValueRange::point(if xor { a ^ c } else { a | c });
        }
        let hi = match (self.hi, other.hi) {
            (Some(b), Some(d)) => Some(fill_ones(b.max(d))),
            _ => None,
        };
        ValueRange { lo: 0, hi }
    }

    /// True when every value fits in `width` bits.
    pub fn fits_width(&self, width: u32) -> bool {
        self.hi.is_some_and(|hi| hi <= width_max(width))
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_point(), self.hi) {
            (Some(v), _) => write!(f, "{v:#x}"),
            (None, Some(hi)) => write!(f, "{:#x}..{hi:#x}", self.lo),
            (None, None) => write!(f, "{:#x}..", self.lo),
        }
    }
}

/// Largest value representable in `width` bits (`width` is clamped to 128).
pub fn width_max(width: u32) -> u128 {
    match width {
        0 => 0,
        w if w >= 128 => u128::MAX,
        w => (1u128 << w) - 1,
    }
}

fn checked_shl(v: u128, by: u128) -> Result<u128, EvalError> {
    if v == 0 {
        return Ok(0);
    }
    let by = u32::try_from(by).map_err(|_| EvalError::Overflow)?;
    if by >= 128 || v.leading_zeros() < by {
        return Err(EvalError::Overflow);
    }
    Ok(v << by)
}

fn shr_saturating(v: u128, by: u128) -> u128 {
    if by >= 128 {
        0
    } else {
        v >> by
    }
}

fn fill_ones(v: u128) -> u128 {
    if v == 0 {
        0
    } else {
        u128::MAX >> v.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_bounded() {
        let r = ValueRange::bounded(1, 5).add(&ValueRange::bounded(2, 3)).unwrap();
        assert_eq!(r, ValueRange::bounded(3, 8));
    }

    #[test]
    fn add_overflow_is_error() {
        let r = ValueRange::point(u128::MAX).add(&ValueRange::point(1));
        assert_eq!(r, Err(EvalError::Overflow));
    }

    #[test]
    fn sub_negative_is_error() {
        let r = ValueRange::bounded(0, 48).sub(&ValueRange::point(1));
        assert_eq!(r, Err(EvalError::Negative));
        let ok = ValueRange::bounded(1, 48).sub(&ValueRange::point(1)).unwrap();
        assert_eq!(ok, ValueRange::bounded(0, 47));
    }

    #[test]
    fn mul_with_unbounded() {
        let r = ValueRange::bounded(2, 3).mul(&ValueRange::unbounded()).unwrap();
        assert_eq!(r, ValueRange::unbounded());
        let z = ValueRange::point(0).mul(&ValueRange::unbounded()).unwrap();
        assert_eq!(z, ValueRange::point(0));
    }

    #[test]
    fn div_by_zero_range() {
        let r = ValueRange::point(10).div(&ValueRange::bounded(0, 2));
        assert_eq!(r, Err(EvalError::DivideByZero));
        let q = ValueRange::bounded(10, 20).div(&ValueRange::bounded(2, 5)).unwrap();
        assert_eq!(q, ValueRange::bounded(2, 10));
    }

    #[test]
    fn shift_overflow() {
        assert_eq!(
            ValueRange::point(1).shl(&ValueRange::point(128)),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            ValueRange::point(1).shl(&ValueRange::point(12)).unwrap(),
            ValueRange::point(0x1000)
        );
    }

    #[test]
    fn bitwise_points_are_exact() {
        let a = ValueRange::point(0x1abc);
        assert_eq!(a.and(&ValueRange::point(0xfff)), ValueRange::point(0xabc));
        assert_eq!(
            ValueRange::point(0x1000).or_xor(&ValueRange::point(5), false),
            ValueRange::point(0x1005)
        );
    }

    #[test]
    fn width_checks() {
        assert!(ValueRange::point(0xffff).fits_width(16));
        assert!(!ValueRange::point(0x10000).fits_width(16));
        assert!(ValueRange::point(u128::MAX).fits_width(128));
        assert!(!ValueRange::unbounded().fits_width(128));
    }

    #[test]
    fn covers_and_contains() {
        let outer = ValueRange::bounded(0x0800, 0x08ff);
        assert!(outer.contains(0x0806));
        assert!(outer.covers(&ValueRange::point(0x0800)));
        assert!(!outer.covers(&ValueRange::bounded(0x0800, 0x0900)));
    }

    #[test]
    fn display_forms() {
        assert_eq!(ValueRange::point(0x800).to_string(), "0x800");
        assert_eq!(ValueRange::bounded(1, 2).to_string(), "0x1..0x2");
    }
}
