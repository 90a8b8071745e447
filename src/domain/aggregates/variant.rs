//! Variant stock aggregate

use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::value_objects::{Quantity, QuantityError, StockDelta};
use crate::{MovementOrigin, NewMovement, Variant};

/// A variant's `stock_unitario` as stored, negative legacy values included.
#[derive(Clone, Debug)]
pub struct VariantStock {
    variant_id: i64,
    article_id: i64,
    stock: i64,
    events: Vec<DomainEvent>,
}

impl VariantStock {
    pub fn load(variant: &Variant) -> Self {
        Self {
            variant_id: variant.id, article_id: variant.article_id,
            stock: variant.stock_unitario, events: vec![],
        }
    }

    pub fn set_stock(&mut self, new_stock: i64) -> Result<StockDelta, QuantityError> {
        let next = Quantity::new(new_stock)?;
        let delta = StockDelta::between(self.stock, next);
        let previous = self.stock;
        self.stock = next.value();
        if !delta.is_zero() {
            self.raise_event(DomainEvent::Stock(StockEvent::VariantAdjusted {
                article_id: self.article_id, variant_id: self.variant_id,
                previous, new_stock: next.value(),
            }));
        }
        Ok(delta)
    }

    /// Ledger row for an edit, `None` when nothing changed. The balance is the variant's own.
    pub fn adjustment_movement(&self, delta: StockDelta) -> Option<NewMovement> {
        delta.direction().map(|direction| NewMovement {
            article_id: self.article_id, variant_id: Some(self.variant_id), order_id: None,
            origin: MovementOrigin::Ajuste, direction, quantity: delta.magnitude(),
            resulting_balance: self.stock,
        })
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MovementDirection;

    fn variant(stock: i64) -> Variant { Variant { id: 11, article_id: 1, size_id: Some(2), color_id: Some(3), stock_unitario: stock } }

    #[test]
    fn test_increase_produces_entrada() {
        let mut v = VariantStock::load(&variant(5));
        let delta = v.set_stock(9).unwrap();
        let m = v.adjustment_movement(delta).unwrap();
        assert_eq!(m.origin, MovementOrigin::Ajuste);
        assert_eq!(m.direction, MovementDirection::Entrada);
        assert_eq!(m.quantity, 4);
        assert_eq!(m.resulting_balance, 9);
        assert_eq!(m.variant_id, Some(11));
    }

    #[test]
    fn test_decrease_produces_salida() {
        let mut v = VariantStock::load(&variant(5));
        let delta = v.set_stock(1).unwrap();
        let m = v.adjustment_movement(delta).unwrap();
        assert_eq!(m.direction, MovementDirection::Salida);
        assert_eq!(m.quantity, 4);
    }

    #[test]
    fn test_negative_stored_stock_counts_in_full() {
        let mut v = VariantStock::load(&variant(-4));
        let delta = v.set_stock(0).unwrap();
        let m = v.adjustment_movement(delta).unwrap();
        assert_eq!((m.direction, m.quantity, m.resulting_balance), (MovementDirection::Entrada, 4, 0));

        let mut v = VariantStock::load(&variant(-2));
        let delta = v.set_stock(3).unwrap();
        let m = v.adjustment_movement(delta).unwrap();
        assert_eq!((m.direction, m.quantity, m.resulting_balance), (MovementDirection::Entrada, 5, 3));
    }

    #[test]
    fn test_same_value_is_noop() {
        let mut v = VariantStock::load(&variant(9));
        let delta = v.set_stock(9).unwrap();
        assert!(v.adjustment_movement(delta).is_none());
        assert!(v.take_events().is_empty());
    }
}
