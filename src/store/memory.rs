use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ArticleCommit, StockStore, StoreError, StoreResult, VariantCommit};
use crate::domain::aggregates::aggregate_total;
use crate::{Article, NewMovement, StockMovement, Variant};

/// In-memory store for tests/dev. One mutex covers a whole unit of work.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    inner: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    articles: HashMap<i64, Article>,
    variants: BTreeMap<i64, Variant>,
    /// Append order.
    movements: Vec<StockMovement>,
}

impl State {
    fn append(&mut self, m: NewMovement) -> StockMovement {
        let movement = StockMovement {
            id: Uuid::now_v7(), article_id: m.article_id, variant_id: m.variant_id, order_id: m.order_id,
            origin: m.origin, direction: m.direction, quantity: m.quantity,
            created_at: Utc::now(), resulting_balance: m.resulting_balance,
        };
        self.movements.push(movement.clone());
        movement
    }

    fn variants_of(&self, article_id: i64) -> Vec<Variant> {
        self.variants.values().filter(|v| v.article_id == article_id).cloned().collect()
    }
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces an article row (admin CRUD path, no ledger row).
    pub fn put_article(&self, article: Article) {
        if let Ok(mut state) = self.inner.lock() {
            state.articles.insert(article.id, article);
        }
    }

    pub fn put_variant(&self, variant: Variant) {
        if let Ok(mut state) = self.inner.lock() {
            state.variants.insert(variant.id, variant);
        }
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn article(&self, id: i64) -> StoreResult<Option<Article>> {
        Ok(self.state()?.articles.get(&id).cloned())
    }

    async fn variant(&self, id: i64) -> StoreResult<Option<Variant>> {
        Ok(self.state()?.variants.get(&id).cloned())
    }

    async fn variants_of(&self, article_id: i64) -> StoreResult<Vec<Variant>> {
        Ok(self.state()?.variants_of(article_id))
    }

    async fn movements_of(&self, article_id: i64) -> StoreResult<Vec<StockMovement>> {
        let state = self.state()?;
        Ok(state.movements.iter().rev().filter(|m| m.article_id == article_id).cloned().collect())
    }

    async fn append_movement(&self, movement: NewMovement) -> StoreResult<StockMovement> {
        let mut state = self.state()?;
        if !state.articles.contains_key(&movement.article_id) {
            return Err(StoreError::RowMissing { table: "articles", id: movement.article_id });
        }
        Ok(state.append(movement))
    }

    async fn append_snapshot_movement(&self, mut movement: NewMovement) -> StoreResult<StockMovement> {
        let mut state = self.state()?;
        let article = state.articles.get(&movement.article_id)
            .ok_or(StoreError::RowMissing { table: "articles", id: movement.article_id })?;
        movement.resulting_balance = article.total_stock;
        Ok(state.append(movement))
    }

    async fn commit_article_stock(
        &self,
        article_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<ArticleCommit> {
        let mut state = self.state()?;
        let article = state.articles.get_mut(&article_id).ok_or(StoreError::RowMissing { table: "articles", id: article_id })?;
        if article.total_stock != expected {
            return Err(StoreError::Conflict);
        }
        article.total_stock = new_stock;
        article.updated_at = Utc::now();
        let article = article.clone();
        let movement = movement.map(|m| state.append(m));
        Ok(ArticleCommit { article, movement })
    }

    async fn commit_variant_stock(
        &self,
        variant_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<VariantCommit> {
        let mut state = self.state()?;
        let variant = state.variants.get_mut(&variant_id).ok_or(StoreError::RowMissing { table: "variants", id: variant_id })?;
        if variant.stock_unitario != expected {
            return Err(StoreError::Conflict);
        }
        let article_id = variant.article_id;
        if !state.articles.contains_key(&article_id) {
            return Err(StoreError::RowMissing { table: "articles", id: article_id });
        }
        let variant = {
            let v = state.variants.get_mut(&variant_id).ok_or(StoreError::RowMissing { table: "variants", id: variant_id })?;
            v.stock_unitario = new_stock;
            v.clone()
        };
        let movement = movement.map(|m| state.append(m));
        let total = aggregate_total(&state.variants_of(article_id));
        let article = state.articles.get_mut(&article_id).ok_or(StoreError::RowMissing { table: "articles", id: article_id })?;
        article.total_stock = total;
        article.updated_at = Utc::now();
        let article = article.clone();
        Ok(VariantCommit { variant, article, movement })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MovementDirection, MovementOrigin};
    use rust_decimal::Decimal;

    fn seeded() -> InMemoryStockStore {
        let store = InMemoryStockStore::new();
        store.put_article(Article { id: 1, name: "Pantalón".into(), price: Decimal::new(20000, 2), total_stock: 8, active: true, updated_at: Utc::now() });
        store.put_variant(Variant { id: 10, article_id: 1, size_id: Some(1), color_id: Some(1), stock_unitario: 5 });
        store.put_variant(Variant { id: 11, article_id: 1, size_id: Some(2), color_id: Some(1), stock_unitario: 3 });
        store
    }

    fn movement(balance: i64) -> NewMovement {
        NewMovement { article_id: 1, variant_id: None, order_id: Some(4), origin: MovementOrigin::Factura, direction: MovementDirection::Salida, quantity: 1, resulting_balance: balance }
    }

    #[tokio::test]
    async fn test_stale_expected_writes_nothing() {
        let store = seeded();
        let err = store.commit_article_stock(1, 99, 0, Some(movement(0))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.article(1).await.unwrap().unwrap().total_stock, 8);
        assert!(store.movements_of(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_variant_commit_resums_article() {
        let store = seeded();
        let commit = store.commit_variant_stock(10, 5, 9, None).await.unwrap();
        assert_eq!(commit.variant.stock_unitario, 9);
        assert_eq!(commit.article.total_stock, 12);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = seeded();
        let first = store.append_movement(movement(7)).await.unwrap();
        let second = store.append_movement(movement(6)).await.unwrap();
        let history = store.movements_of(1).await.unwrap();
        assert_eq!(history.iter().map(|m| m.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_append_requires_article() {
        let store = seeded();
        let mut m = movement(0);
        m.article_id = 404;
        assert!(matches!(store.append_movement(m).await, Err(StoreError::RowMissing { table: "articles", id: 404 })));
    }

    #[tokio::test]
    async fn test_snapshot_append_overrides_balance() {
        let store = seeded();
        let recorded = store.append_snapshot_movement(movement(-1)).await.unwrap();
        assert_eq!(recorded.resulting_balance, 8);
        let mut m = movement(0);
        m.article_id = 404;
        assert!(matches!(store.append_snapshot_movement(m).await, Err(StoreError::RowMissing { table: "articles", id: 404 })));
    }
}
