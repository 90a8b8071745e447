//! Persistence for articles, variants and the movement ledger.
//!
//! Every `commit_*` call is one unit of work: the conditional stock update and
//! the ledger append are applied together or not at all. The update only goes
//! through while the stored value still equals `expected`; otherwise the call
//! fails with [`StoreError::Conflict`] and nothing is written.

use async_trait::async_trait;
use thiserror::Error;

use crate::{Article, NewMovement, StockMovement, Variant};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStockStore;
pub use postgres::PgStockStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("stored value changed since it was read")]
    Conflict,

    #[error("{table} row {id} does not exist")]
    RowMissing { table: &'static str, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Decode(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq)]
pub struct ArticleCommit {
    pub article: Article,
    pub movement: Option<StockMovement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantCommit {
    pub variant: Variant,
    /// Parent article with its total re-summed from all variants.
    pub article: Article,
    pub movement: Option<StockMovement>,
}

#[async_trait]
pub trait StockStore: Send + Sync {
    async fn article(&self, id: i64) -> StoreResult<Option<Article>>;

    async fn variant(&self, id: i64) -> StoreResult<Option<Variant>>;

    async fn variants_of(&self, article_id: i64) -> StoreResult<Vec<Variant>>;

    /// Ledger rows for an article, newest first.
    async fn movements_of(&self, article_id: i64) -> StoreResult<Vec<StockMovement>>;

    /// Appends one ledger row; id and `created_at` are assigned here.
    async fn append_movement(&self, movement: NewMovement) -> StoreResult<StockMovement>;

    /// Like [`append_movement`](Self::append_movement), but `resulting_balance`
    /// is replaced by the article's `total_stock`, read while holding the
    /// article row so no stock commit can land between the read and the append.
    async fn append_snapshot_movement(&self, movement: NewMovement) -> StoreResult<StockMovement>;

    async fn commit_article_stock(
        &self,
        article_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<ArticleCommit>;

    /// Sets the variant's stock, appends `movement` and re-sums the parent article.
    async fn commit_variant_stock(
        &self,
        variant_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<VariantCommit>;
}
