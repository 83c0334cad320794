//! Common types used across the platform

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Tolerance used when comparing recomputed average costs
pub const COST_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Error returned when a stored enum label cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// True when two decimals differ by no more than [`COST_EPSILON`]
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= COST_EPSILON
}

/// Returns the value as a count when it has no fractional part
pub fn whole_units(quantity: Decimal) -> Option<usize> {
    if quantity < Decimal::ZERO || quantity.fract() != Decimal::ZERO {
        return None;
    }
    quantity.to_usize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_value() {
        assert_eq!(COST_EPSILON, Decimal::new(1, 6));
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(Decimal::new(250000001, 7), Decimal::from(25)));
        assert!(!approx_eq(Decimal::new(2501, 2), Decimal::from(25)));
    }

    #[test]
    fn test_whole_units() {
        assert_eq!(whole_units(Decimal::from(3)), Some(3));
        assert_eq!(whole_units(Decimal::new(300, 2)), Some(3));
        assert_eq!(whole_units(Decimal::new(25, 1)), None);
        assert_eq!(whole_units(Decimal::from(-1)), None);
    }
}
