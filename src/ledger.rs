//! Stock movement ledger.
//!
//! Append-only: rows are written once and read back newest first. There is no
//! update or delete path.

use std::sync::Arc;

use tracing::debug;

use crate::domain::value_objects::MovedUnits;
use crate::store::{StockStore, StoreError};
use crate::{NewMovement, Result, StockError, StockMovement};

#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn StockStore>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Appends one row. Quantity is a magnitude; `direction` carries the sign.
    pub async fn record(&self, movement: NewMovement) -> Result<StockMovement> {
        self.append(movement, false).await
    }

    /// Appends one row whose balance is the article's `total_stock` at append
    /// time; the incoming `resulting_balance` is ignored.
    pub async fn record_snapshot(&self, movement: NewMovement) -> Result<StockMovement> {
        self.append(movement, true).await
    }

    async fn append(&self, movement: NewMovement, snapshot: bool) -> Result<StockMovement> {
        MovedUnits::new(movement.quantity).map_err(|e| StockError::Validation(e.to_string()))?;
        let article_id = movement.article_id;
        let quantity = movement.quantity;
        let appended = if snapshot {
            self.store.append_snapshot_movement(movement).await
        } else {
            self.store.append_movement(movement).await
        };
        let recorded = appended.map_err(|e| match e {
            StoreError::RowMissing { table: "articles", .. } => StockError::ArticleNotFound(article_id),
            source => StockError::Persistence { article_id, quantity, source },
        })?;
        debug!(movement_id = %recorded.id, article_id, origin = %recorded.origin, direction = %recorded.direction, quantity, balance = recorded.resulting_balance, "movement recorded");
        Ok(recorded)
    }

    /// Rows for `article_id`, newest first.
    pub async fn history(&self, article_id: i64) -> Result<Vec<StockMovement>> {
        self.store.movements_of(article_id).await
            .map_err(|source| StockError::Persistence { article_id, quantity: 0, source })
    }
}
