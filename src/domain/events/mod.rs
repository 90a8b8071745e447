//! Domain events
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{MovementDirection, MovementOrigin};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Stock(StockEvent),
    Ledger(LedgerEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockEvent {
    SaleConsumed { article_id: i64, order_id: i64, requested: i64, previous: i64, new_stock: i64 },
    CreditNoteReturned { article_id: i64, order_id: i64, quantity: i64, new_stock: i64 },
    ArticleAdjusted { article_id: i64, previous: i64, new_stock: i64 },
    VariantAdjusted { article_id: i64, variant_id: i64, previous: i64, new_stock: i64 },
    AggregateRecomputed { article_id: i64, total_stock: i64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    MovementRecorded { movement_id: Uuid, article_id: i64, origin: MovementOrigin, direction: MovementDirection, quantity: i64, resulting_balance: i64 },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Stock(StockEvent::SaleConsumed { .. }) => "stock.sale_consumed",
            Self::Stock(StockEvent::CreditNoteReturned { .. }) => "stock.credit_note_returned",
            Self::Stock(StockEvent::ArticleAdjusted { .. }) => "stock.article_adjusted",
            Self::Stock(StockEvent::VariantAdjusted { .. }) => "stock.variant_adjusted",
            Self::Stock(StockEvent::AggregateRecomputed { .. }) => "stock.aggregate_recomputed",
            Self::Ledger(LedgerEvent::MovementRecorded { .. }) => "stock.movement_recorded",
        }
    }

    pub fn article_id(&self) -> i64 {
        match self {
            Self::Stock(StockEvent::SaleConsumed { article_id, .. })
            | Self::Stock(StockEvent::CreditNoteReturned { article_id, .. })
            | Self::Stock(StockEvent::ArticleAdjusted { article_id, .. })
            | Self::Stock(StockEvent::VariantAdjusted { article_id, .. })
            | Self::Stock(StockEvent::AggregateRecomputed { article_id, .. })
            | Self::Ledger(LedgerEvent::MovementRecorded { article_id, .. }) => *article_id,
        }
    }
}

impl From<&crate::StockMovement> for DomainEvent {
    fn from(m: &crate::StockMovement) -> Self {
        Self::Ledger(LedgerEvent::MovementRecorded {
            movement_id: m.id, article_id: m.article_id, origin: m.origin, direction: m.direction,
            quantity: m.quantity, resulting_balance: m.resulting_balance,
        })
    }
}
