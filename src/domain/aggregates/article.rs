//! Article stock aggregate

use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::value_objects::{MovedUnits, Quantity, QuantityError, StockDelta};
use crate::{Article, Variant};

/// The on-hand total of one article, as read before a mutation. The stored
/// value is kept as is; only values written back are floored at zero.
#[derive(Clone, Debug)]
pub struct ArticleStock {
    article_id: i64,
    total: i64,
    events: Vec<DomainEvent>,
}

/// Result of taking units out for a sale line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consumption {
    pub previous: i64,
    pub new_stock: i64,
    /// What the caller asked for; can exceed `applied`.
    pub requested: i64,
    pub applied: i64,
}

impl ArticleStock {
    pub fn load(article: &Article) -> Self {
        Self { article_id: article.id, total: article.total_stock, events: vec![] }
    }

    pub fn total(&self) -> i64 { self.total }

    /// Decrements the total, clamped at zero. Asking for more than is on hand is not an error.
    pub fn consume(&mut self, units: MovedUnits, order_id: i64) -> Consumption {
        let previous = self.total;
        self.total = Quantity::clamped(previous.saturating_sub(units.value())).value();
        self.raise_event(DomainEvent::Stock(StockEvent::SaleConsumed {
            article_id: self.article_id, order_id, requested: units.value(),
            previous, new_stock: self.total,
        }));
        Consumption {
            previous, new_stock: self.total,
            requested: units.value(), applied: (previous - self.total).max(0),
        }
    }

    pub fn restock(&mut self, units: MovedUnits, order_id: i64) -> (i64, i64) {
        let previous = self.total;
        self.total = Quantity::clamped(previous.saturating_add(units.value())).value();
        self.raise_event(DomainEvent::Stock(StockEvent::CreditNoteReturned {
            article_id: self.article_id, order_id, quantity: units.value(), new_stock: self.total,
        }));
        (previous, self.total)
    }

    pub fn adjust_to(&mut self, new_total: i64) -> Result<StockDelta, QuantityError> {
        let next = Quantity::new(new_total)?;
        let delta = StockDelta::between(self.total, next);
        let previous = self.total;
        self.total = next.value();
        if !delta.is_zero() {
            self.raise_event(DomainEvent::Stock(StockEvent::ArticleAdjusted {
                article_id: self.article_id, previous, new_stock: next.value(),
            }));
        }
        Ok(delta)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Full re-aggregation: the article total is the sum of all its variants.
pub fn aggregate_total(variants: &[Variant]) -> i64 {
    variants.iter().map(|v| v.stock_unitario).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn article(stock: i64) -> Article {
        Article { id: 1, name: "Remera".into(), price: Decimal::new(1500, 0), total_stock: stock, active: true, updated_at: Utc::now() }
    }

    #[test]
    fn test_consume_within_stock() {
        let mut s = ArticleStock::load(&article(10));
        let c = s.consume(MovedUnits::new(3).unwrap(), 1);
        assert_eq!(c, Consumption { previous: 10, new_stock: 7, requested: 3, applied: 3 });
        assert_eq!(s.take_events().len(), 1);
    }

    #[test]
    fn test_consume_clamps() {
        let mut s = ArticleStock::load(&article(7));
        let c = s.consume(MovedUnits::new(20).unwrap(), 2);
        assert_eq!(c.new_stock, 0);
        assert_eq!(c.requested, 20);
        assert_eq!(c.applied, 7);
    }

    #[test]
    fn test_adjust_without_change_raises_nothing() {
        let mut s = ArticleStock::load(&article(4));
        assert!(s.adjust_to(4).unwrap().is_zero());
        assert!(s.take_events().is_empty());
        assert!(s.adjust_to(-2).is_err());
    }

    #[test]
    fn test_negative_stored_total_is_not_floored_before_the_delta() {
        let mut s = ArticleStock::load(&article(-2));
        let delta = s.adjust_to(3).unwrap();
        assert_eq!((delta.value(), delta.magnitude()), (5, 5));

        let mut s = ArticleStock::load(&article(-3));
        let c = s.consume(MovedUnits::new(1).unwrap(), 1);
        assert_eq!(c, Consumption { previous: -3, new_stock: 0, requested: 1, applied: 0 });
    }

    #[test]
    fn test_aggregate_total() {
        let v = |id, stock| Variant { id, article_id: 1, size_id: None, color_id: None, stock_unitario: stock };
        assert_eq!(aggregate_total(&[v(1, 5), v(2, 3)]), 8);
        assert_eq!(aggregate_total(&[]), 0);
    }
}
