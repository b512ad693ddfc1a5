use std::fmt::{self, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};

/// An arbitrary-precision signed decimal.
///
/// Addition, subtraction, multiplication and negation are exact. Division
/// rounds the quotient to 10 fractional digits using half-even (banker's)
/// rounding, the one inexact operation the language exposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Number(BigDecimal);

const DIVISION_SCALE: i64 = 10;

impl Number {
    pub fn zero() -> Self {
        Self(BigDecimal::zero())
    }

    pub fn from_i64(value: i64) -> Self {
        Self(BigDecimal::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Division with the language's mandated 10-digit half-even rounding.
    /// Returns `None` when `self` is zero, matching §4.F's "division by zero
    /// is an error" rule.
    pub fn checked_div(&self, other: &Number) -> Option<Number> {
        if other.0.is_zero() {
            return None;
        }
        Some(Number((&self.0 / &other.0).with_scale_round(DIVISION_SCALE, RoundingMode::HalfEven)))
    }

    /// Render in plain decimal form, stripping a trailing `.0` when present.
    pub fn to_display_string(&self) -> String {
        let normalized = self.0.normalized();
        let text = normalized.to_plain_string();
        text.strip_suffix(".0").map(str::to_owned).unwrap_or(text)
    }

    /// Used by ranges to step one value at a time.
    pub fn one() -> Self {
        Self(BigDecimal::from(1))
    }
}

impl FromStr for Number {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s).map(Number)
    }
}

impl Add for &Number {
    type Output = Number;
    fn add(self, rhs: Self) -> Number {
        Number(&self.0 + &rhs.0)
    }
}

impl Sub for &Number {
    type Output = Number;
    fn sub(self, rhs: Self) -> Number {
        Number(&self.0 - &rhs.0)
    }
}

impl Mul for &Number {
    type Output = Number;
    fn mul(self, rhs: Self) -> Number {
        Number(&self.0 * &rhs.0)
    }
}

impl Neg for &Number {
    type Output = Number;
    fn neg(self) -> Number {
        Number(-&self.0)
    }
}

impl Div for &Number {
    type Output = Option<Number>;
    fn div(self, rhs: Self) -> Option<Number> {
        self.checked_div(rhs)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_zero_fraction() {
        let n = Number::from_str("5.0").unwrap();
        assert_eq!(n.to_display_string(), "5");
    }

    #[test]
    fn keeps_nonzero_fraction() {
        let n = Number::from_str("5.25").unwrap();
        assert_eq!(n.to_display_string(), "5.25");
    }

    #[test]
    fn division_rounds_half_even_to_ten_digits() {
        let one = Number::from_str("1").unwrap();
        let three = Number::from_str("3").unwrap();
        let result = one.checked_div(&three).unwrap();
        assert_eq!(result.to_display_string(), "0.3333333333");
    }

    #[test]
    fn division_by_zero_is_none() {
        let one = Number::from_str("1").unwrap();
        assert!(one.checked_div(&Number::zero()).is_none());
    }

    #[test]
    fn addition_is_exact() {
        let a = Number::from_str("0.1").unwrap();
        let b = Number::from_str("0.2").unwrap();
        assert_eq!((&a + &b).to_display_string(), "0.3");
    }
}
