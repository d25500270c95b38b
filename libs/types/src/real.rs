//! Scaled decimal representation.
//!
//! A `Real` is an integer mantissa plus a hint describing the scale: decimal
//! exponents from 10^-14 through 10^7, or binary fractions with denominators
//! 1 through 256. The hint values are wire bytes and follow the original
//! numbering.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Scale hint for a [`Real`] value.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
pub enum RealHint {
    ExponentNeg14 = 0,
    ExponentNeg13 = 1,
    ExponentNeg12 = 2,
    ExponentNeg11 = 3,
    ExponentNeg10 = 4,
    ExponentNeg9 = 5,
    ExponentNeg8 = 6,
    ExponentNeg7 = 7,
    ExponentNeg6 = 8,
    ExponentNeg5 = 9,
    ExponentNeg4 = 10,
    ExponentNeg3 = 11,
    ExponentNeg2 = 12,
    ExponentNeg1 = 13,
    Exponent0 = 14,
    Exponent1 = 15,
    Exponent2 = 16,
    Exponent3 = 17,
    Exponent4 = 18,
    Exponent5 = 19,
    Exponent6 = 20,
    Exponent7 = 21,
    Fraction1 = 22,
    Fraction2 = 23,
    Fraction4 = 24,
    Fraction8 = 25,
    Fraction16 = 26,
    Fraction32 = 27,
    Fraction64 = 28,
    Fraction128 = 29,
    Fraction256 = 30,
}

impl RealHint {
    /// Decimal exponent for exponent hints, `None` for fraction hints.
    pub fn exponent(&self) -> Option<i32> {
        let raw = *self as u8;
        if raw <= RealHint::Exponent7 as u8 {
            Some(raw as i32 - 14)
        } else {
            None
        }
    }

    /// Fraction denominator for fraction hints, `None` for exponent hints.
    pub fn denominator(&self) -> Option<u32> {
        let raw = *self as u8;
        if raw >= RealHint::Fraction1 as u8 {
            Some(1u32 << (raw - RealHint::Fraction1 as u8))
        } else {
            None
        }
    }
}

/// Scaled decimal value: `value * 10^exponent` or `value / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Real {
    pub hint: RealHint,
    pub value: i64,
}

impl Real {
    pub fn new(hint: RealHint, value: i64) -> Self {
        Self { hint, value }
    }

    /// Lossy conversion to floating point, for display and comparison only.
    /// The wire representation always carries the exact mantissa and hint.
    pub fn to_f64(&self) -> f64 {
        match (self.hint.exponent(), self.hint.denominator()) {
            (Some(exp), _) => self.value as f64 * 10f64.powi(exp),
            (_, Some(denom)) => self.value as f64 / denom as f64,
            _ => unreachable!("hint is either exponent or fraction"),
        }
    }
}
