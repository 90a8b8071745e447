//! Value Objects for stock

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::MovementDirection;

/// Quantity value object: an on-hand count, never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 0 { return Err(QuantityError::Negative(value)); }
        Ok(Self(value))
    }
    /// Floors any value at zero.
    pub fn clamped(value: i64) -> Self { Self(value.max(0)) }
    pub fn value(&self) -> i64 { self.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Negative(i64), NotPositive(i64) }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative(v) => write!(f, "el stock no puede ser negativo ({v})"),
            Self::NotPositive(v) => write!(f, "la cantidad debe ser mayor que cero ({v})"),
        }
    }
}

/// Units moved by a sale line or a credit note. Always >= 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedUnits(i64);

impl MovedUnits {
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::NotPositive(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> i64 { self.0 }
}

/// Signed change between a stored stock value and a validated new one. The
/// stored side is taken as is, even when a legacy row holds a negative count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta(i64);

impl StockDelta {
    pub fn between(stored: i64, next: Quantity) -> Self { Self(next.value().saturating_sub(stored)) }
    pub fn value(&self) -> i64 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn magnitude(&self) -> i64 { self.0.abs() }
    /// `None` for a zero delta: nothing moved.
    pub fn direction(&self) -> Option<MovementDirection> {
        match self.0 {
            0 => None,
            d if d > 0 => Some(MovementDirection::Entrada),
            _ => Some(MovementDirection::Salida),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_quantity_clamps_at_zero() {
        assert_eq!(Quantity::clamped(4).value(), 4);
        assert_eq!(Quantity::clamped(7 - 20).value(), 0);
        assert!(Quantity::new(-1).is_err());
    }
    #[test]
    fn test_moved_units() {
        assert!(MovedUnits::new(0).is_err());
        assert_eq!(MovedUnits::new(3).unwrap().value(), 3);
    }
    #[test]
    fn test_delta_direction() {
        let five = Quantity::new(5).unwrap();
        let nine = Quantity::new(9).unwrap();
        let up = StockDelta::between(5, nine);
        assert_eq!(up.direction(), Some(MovementDirection::Entrada));
        assert_eq!(up.magnitude(), 4);
        let down = StockDelta::between(9, five);
        assert_eq!(down.direction(), Some(MovementDirection::Salida));
        assert_eq!(down.magnitude(), 4);
        assert_eq!(StockDelta::between(9, nine).direction(), None);
    }
    #[test]
    fn test_delta_from_negative_stored_value() {
        let delta = StockDelta::between(-4, Quantity::new(0).unwrap());
        assert_eq!((delta.direction(), delta.magnitude()), (Some(MovementDirection::Entrada), 4));
        assert_eq!(StockDelta::between(-2, Quantity::new(3).unwrap()).magnitude(), 5);
    }
}
