//! Offsets in quarter lengths
//!
//! Positions inside a container and element durations are exact rationals
//! measured in quarter notes, so triplets and dotted values never drift.

use num_rational::Rational32;

/// A position or duration in quarter-note units
pub type OffsetQL = Rational32;

/// Whole number of quarter lengths
pub fn ql(quarters: i32) -> OffsetQL {
    OffsetQL::from_integer(quarters)
}

/// Fractional quarter length (`ql_frac(3, 2)` is a dotted quarter)
pub fn ql_frac(numerator: i32, denominator: i32) -> OffsetQL {
    OffsetQL::new(numerator, denominator)
}
