//! Stock mutation coordinator.
//!
//! Every stock-affecting business event goes through here: sale lines, credit
//! notes, manual adjustments and variant edits. Each operation reads the
//! current value, applies the domain rule, and commits the new value together
//! with its ledger row as one unit of work conditioned on the value it read.
//! When another writer got there first the operation re-reads and tries again,
//! up to `max_retries` times, then reports [`StockError::Conflict`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::aggregates::{aggregate_total, ArticleStock, VariantStock};
use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::value_objects::{MovedUnits, QuantityError};
use crate::ledger::StockLedger;
use crate::notify::StockNotifier;
use crate::store::{StockStore, StoreError};
use crate::{
    Article, MovementDirection, MovementOrigin, NewMovement, Result, StockError, StockMovement, Variant,
};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaleConsumption {
    pub article: Article,
    pub movement: StockMovement,
    /// Units actually taken off; less than the requested quantity when stock ran out.
    pub applied: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StockReturn {
    pub article: Article,
    pub movement: StockMovement,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArticleAdjustment {
    pub article: Article,
    pub movement: Option<StockMovement>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantAdjustment {
    pub variant: Variant,
    pub article: Article,
    /// `None` when the new value equals the old one.
    pub movement: Option<StockMovement>,
}

/// Read-only consistency report for one article.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub article_id: i64,
    pub total_stock: i64,
    pub variant_count: usize,
    pub variant_sum: Option<i64>,
    pub latest_movement: Option<StockMovement>,
    /// Latest article-level balance matches `total_stock`. `None` when there is
    /// no movement or the latest one carries a variant balance.
    pub balance_in_sync: Option<bool>,
    /// `total_stock` equals the variant sum. `None` without variants.
    pub aggregate_in_sync: Option<bool>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.balance_in_sync != Some(false) && self.aggregate_in_sync != Some(false)
    }
}

pub struct StockCoordinator {
    store: Arc<dyn StockStore>,
    ledger: StockLedger,
    notifier: StockNotifier,
    max_retries: u32,
}

impl StockCoordinator {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self {
            ledger: StockLedger::new(store.clone()),
            store,
            notifier: StockNotifier::disabled(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_notifier(mut self, notifier: StockNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Takes `quantity` units off an article for a sale line.
    ///
    /// The new total is `max(0, total_stock - quantity)`. The ledger row keeps the
    /// requested quantity even when the decrement was clamped.
    #[instrument(skip(self))]
    pub async fn apply_sale_consumption(&self, article_id: i64, quantity: i64, order_id: i64, source_tag: &str) -> Result<SaleConsumption> {
        let units = moved_units(quantity)?;
        let origin = MovementOrigin::from_source_tag(source_tag)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let article = self.load_article(article_id, quantity).await?;
            let mut stock = ArticleStock::load(&article);
            let outcome = stock.consume(units, order_id);
            let movement = NewMovement {
                article_id, variant_id: None, order_id: Some(order_id), origin,
                direction: MovementDirection::Salida, quantity, resulting_balance: outcome.new_stock,
            };
            match self.store.commit_article_stock(article_id, article.total_stock, outcome.new_stock, Some(movement)).await {
                Ok(commit) => {
                    let movement = recorded(commit.movement, article_id, quantity)?;
                    if outcome.applied < outcome.requested {
                        warn!(article_id, requested = quantity, on_hand = outcome.previous, "sale exceeds stock, clamped at zero");
                    }
                    info!(article_id, order_id, previous = outcome.previous, new_stock = outcome.new_stock, "sale consumed stock");
                    self.emit(stock.take_events(), Some(&movement)).await;
                    return Ok(SaleConsumption { article: commit.article, movement, applied: outcome.applied });
                }
                Err(e) => self.retry_or_fail(e, attempt, article_id, quantity)?,
            }
        }
    }

    /// Puts units back on an article for a credit note.
    #[instrument(skip(self))]
    pub async fn apply_credit_note_return(&self, article_id: i64, quantity: i64, order_id: i64) -> Result<StockReturn> {
        let units = moved_units(quantity)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let article = self.load_article(article_id, quantity).await?;
            let mut stock = ArticleStock::load(&article);
            let (previous, new_stock) = stock.restock(units, order_id);
            let movement = NewMovement {
                article_id, variant_id: None, order_id: Some(order_id), origin: MovementOrigin::NotaDeCredito,
                direction: MovementDirection::Entrada, quantity, resulting_balance: new_stock,
            };
            match self.store.commit_article_stock(article_id, article.total_stock, new_stock, Some(movement)).await {
                Ok(commit) => {
                    let movement = recorded(commit.movement, article_id, quantity)?;
                    info!(article_id, order_id, previous, new_stock, "credit note returned stock");
                    self.emit(stock.take_events(), Some(&movement)).await;
                    return Ok(StockReturn { article: commit.article, movement });
                }
                Err(e) => self.retry_or_fail(e, attempt, article_id, quantity)?,
            }
        }
    }

    /// Sets the total of an article without variants. Articles with variants
    /// derive their total and are adjusted through their variants.
    #[instrument(skip(self))]
    pub async fn apply_article_adjustment(&self, article_id: i64, new_total: i64) -> Result<ArticleAdjustment> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let article = self.load_article(article_id, new_total).await?;
            let variants = self.store.variants_of(article_id).await
                .map_err(|source| StockError::Persistence { article_id, quantity: new_total, source })?;
            if !variants.is_empty() {
                return Err(StockError::Validation(format!(
                    "el artículo {article_id} tiene variantes; su stock se ajusta desde cada variante"
                )));
            }
            let mut stock = ArticleStock::load(&article);
            let previous = stock.total();
            let delta = stock.adjust_to(new_total).map_err(validation)?;
            let movement = delta.direction().map(|direction| NewMovement {
                article_id, variant_id: None, order_id: None, origin: MovementOrigin::Ajuste,
                direction, quantity: delta.magnitude(), resulting_balance: new_total,
            });
            match self.store.commit_article_stock(article_id, article.total_stock, new_total, movement).await {
                Ok(commit) => {
                    info!(article_id, previous, new_total, "article stock adjusted");
                    self.emit(stock.take_events(), commit.movement.as_ref()).await;
                    return Ok(ArticleAdjustment { article: commit.article, movement: commit.movement });
                }
                Err(e) => self.retry_or_fail(e, attempt, article_id, new_total)?,
            }
        }
    }

    /// Sets a variant's `stock_unitario`, records an AJUSTE row for a non-zero
    /// change, and re-sums the parent article from all of its variants.
    #[instrument(skip(self))]
    pub async fn apply_variant_adjustment(&self, variant_id: i64, new_stock_unitario: i64) -> Result<VariantAdjustment> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let variant = self.store.variant(variant_id).await
                .map_err(|source| StockError::VariantPersistence { variant_id, quantity: new_stock_unitario, source })?
                .ok_or(StockError::VariantNotFound(variant_id))?;
            let article_id = variant.article_id;
            let mut stock = VariantStock::load(&variant);
            let delta = stock.set_stock(new_stock_unitario).map_err(validation)?;
            let movement = stock.adjustment_movement(delta);
            match self.store.commit_variant_stock(variant_id, variant.stock_unitario, new_stock_unitario, movement).await {
                Ok(commit) => {
                    info!(variant_id, article_id, delta = delta.value(), total_stock = commit.article.total_stock, "variant stock adjusted");
                    let mut events = stock.take_events();
                    events.push(DomainEvent::Stock(StockEvent::AggregateRecomputed {
                        article_id, total_stock: commit.article.total_stock,
                    }));
                    self.emit(events, commit.movement.as_ref()).await;
                    return Ok(VariantAdjustment { variant: commit.variant, article: commit.article, movement: commit.movement });
                }
                Err(StoreError::RowMissing { table: "variants", .. }) => return Err(StockError::VariantNotFound(variant_id)),
                Err(e) => self.retry_or_fail(e, attempt, article_id, new_stock_unitario)?,
            }
        }
    }

    /// Appends a movement snapshotting the article's current `total_stock`.
    /// The stock itself is not changed; the balance is read in the same unit of
    /// work as the append.
    #[instrument(skip(self))]
    pub async fn record_movement(
        &self,
        article_id: i64,
        order_id: Option<i64>,
        origin: MovementOrigin,
        direction: MovementDirection,
        quantity: i64,
    ) -> Result<StockMovement> {
        moved_units(quantity)?;
        let movement = self.ledger.record_snapshot(NewMovement {
            article_id, variant_id: None, order_id, origin, direction, quantity,
            resulting_balance: 0,
        }).await?;
        self.emit(vec![], Some(&movement)).await;
        Ok(movement)
    }

    /// Ledger rows for an article, newest first.
    pub async fn movement_history(&self, article_id: i64) -> Result<Vec<StockMovement>> {
        self.load_article(article_id, 0).await?;
        self.ledger.history(article_id).await
    }

    pub async fn audit_article(&self, article_id: i64) -> Result<LedgerAudit> {
        let article = self.load_article(article_id, 0).await?;
        let variants = self.store.variants_of(article_id).await
            .map_err(|source| StockError::Persistence { article_id, quantity: 0, source })?;
        let latest_movement = self.ledger.history(article_id).await?.into_iter().next();
        let variant_sum = (!variants.is_empty()).then(|| aggregate_total(&variants));
        let balance_in_sync = latest_movement.as_ref()
            .filter(|m| m.variant_id.is_none())
            .map(|m| m.resulting_balance == article.total_stock);
        let audit = LedgerAudit {
            article_id,
            total_stock: article.total_stock,
            variant_count: variants.len(),
            variant_sum,
            aggregate_in_sync: variant_sum.map(|sum| sum == article.total_stock),
            balance_in_sync,
            latest_movement,
        };
        if !audit.is_consistent() {
            warn!(article_id, total_stock = audit.total_stock, variant_sum = ?audit.variant_sum, "stock drift detected");
        }
        Ok(audit)
    }

    async fn load_article(&self, article_id: i64, quantity: i64) -> Result<Article> {
        self.store.article(article_id).await
            .map_err(|source| StockError::Persistence { article_id, quantity, source })?
            .ok_or(StockError::ArticleNotFound(article_id))
    }

    /// `Ok(())` means "read again and retry".
    fn retry_or_fail(&self, err: StoreError, attempt: u32, article_id: i64, quantity: i64) -> Result<()> {
        match err {
            StoreError::Conflict if attempt <= self.max_retries => {
                warn!(article_id, attempt, "stock changed concurrently, retrying");
                Ok(())
            }
            StoreError::Conflict => Err(StockError::Conflict { article_id, quantity, attempts: attempt }),
            StoreError::RowMissing { table: "articles", .. } => Err(StockError::ArticleNotFound(article_id)),
            source => Err(StockError::Persistence { article_id, quantity, source }),
        }
    }

    async fn emit(&self, mut events: Vec<DomainEvent>, movement: Option<&StockMovement>) {
        if let Some(m) = movement {
            events.push(DomainEvent::from(m));
        }
        self.notifier.publish(&events).await;
    }
}

fn moved_units(quantity: i64) -> Result<MovedUnits> {
    MovedUnits::new(quantity).map_err(validation)
}

fn validation(e: QuantityError) -> StockError {
    StockError::Validation(e.to_string())
}

fn recorded(movement: Option<StockMovement>, article_id: i64, quantity: i64) -> Result<StockMovement> {
    movement.ok_or_else(|| StockError::Persistence {
        article_id,
        quantity,
        source: StoreError::Decode("commit returned no ledger row".into()),
    })
}
