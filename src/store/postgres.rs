use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{ArticleCommit, StockStore, StoreError, StoreResult, VariantCommit};
use crate::{Article, NewMovement, StockMovement, Variant};

const ARTICLE_COLUMNS: &str = "id, name, price, total_stock, active, updated_at";
const VARIANT_COLUMNS: &str = "id, article_id, size_id, color_id, stock_unitario";
const MOVEMENT_COLUMNS: &str = "id, article_id, variant_id, order_id, origin, direction, quantity, created_at, resulting_balance";

/// `created_at` is the clock at insert time, not transaction start, so it
/// follows the order in which writers took the article lock.
const INSERT_MOVEMENT: &str = "INSERT INTO stock_movements \
     (id, article_id, variant_id, order_id, origin, direction, quantity, resulting_balance, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, clock_timestamp()) \
     RETURNING id, article_id, variant_id, order_id, origin, direction, quantity, created_at, resulting_balance";

#[derive(Clone)]
pub struct PgStockStore {
    pool: PgPool,
}

impl PgStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    article_id: i64,
    variant_id: Option<i64>,
    order_id: Option<i64>,
    origin: String,
    direction: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    resulting_balance: i64,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> StoreResult<Self> {
        Ok(StockMovement {
            id: row.id,
            article_id: row.article_id,
            variant_id: row.variant_id,
            order_id: row.order_id,
            origin: row.origin.parse().map_err(|e: crate::StockError| StoreError::Decode(e.to_string()))?,
            direction: row.direction.parse().map_err(|e: crate::StockError| StoreError::Decode(e.to_string()))?,
            quantity: row.quantity,
            created_at: row.created_at,
            resulting_balance: row.resulting_balance,
        })
    }
}

async fn insert_movement(conn: &mut PgConnection, m: NewMovement) -> StoreResult<StockMovement> {
    let row = sqlx::query_as::<_, MovementRow>(INSERT_MOVEMENT)
    .bind(Uuid::now_v7()).bind(m.article_id).bind(m.variant_id).bind(m.order_id)
    .bind(m.origin.as_str()).bind(m.direction.as_str()).bind(m.quantity).bind(m.resulting_balance)
    .fetch_one(conn).await?;
    row.try_into()
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn article(&self, id: i64) -> StoreResult<Option<Article>> {
        Ok(sqlx::query_as::<_, Article>(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?)
    }

    async fn variant(&self, id: i64) -> StoreResult<Option<Variant>> {
        Ok(sqlx::query_as::<_, Variant>(&format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await?)
    }

    async fn variants_of(&self, article_id: i64) -> StoreResult<Vec<Variant>> {
        Ok(sqlx::query_as::<_, Variant>(&format!("SELECT {VARIANT_COLUMNS} FROM variants WHERE article_id = $1 ORDER BY id"))
            .bind(article_id).fetch_all(&self.pool).await?)
    }

    async fn movements_of(&self, article_id: i64) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE article_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(article_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(StockMovement::try_from).collect()
    }

    async fn append_movement(&self, movement: NewMovement) -> StoreResult<StockMovement> {
        let mut conn = self.pool.acquire().await?;
        insert_movement(&mut *conn, movement).await
    }

    async fn append_snapshot_movement(&self, mut movement: NewMovement) -> StoreResult<StockMovement> {
        let mut tx = self.pool.begin().await?;
        let current: Option<(i64,)> = sqlx::query_as("SELECT total_stock FROM articles WHERE id = $1 FOR UPDATE")
            .bind(movement.article_id).fetch_optional(&mut *tx).await?;
        let Some((total_stock,)) = current else {
            tx.rollback().await?;
            return Err(StoreError::RowMissing { table: "articles", id: movement.article_id });
        };
        movement.resulting_balance = total_stock;
        let recorded = insert_movement(&mut *tx, movement).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    async fn commit_article_stock(
        &self,
        article_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<ArticleCommit> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET total_stock = $2, updated_at = NOW() WHERE id = $1 AND total_stock = $3 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article_id).bind(new_stock).bind(expected)
        .fetch_optional(&mut *tx).await?;

        let Some(article) = updated else {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE id = $1")
                .bind(article_id).fetch_optional(&mut *tx).await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict,
                None => StoreError::RowMissing { table: "articles", id: article_id },
            });
        };

        let movement = match movement {
            Some(m) => Some(insert_movement(&mut *tx, m).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(ArticleCommit { article, movement })
    }

    async fn commit_variant_stock(
        &self,
        variant_id: i64,
        expected: i64,
        new_stock: i64,
        movement: Option<NewMovement>,
    ) -> StoreResult<VariantCommit> {
        let mut tx = self.pool.begin().await?;
        let parent: Option<(i64,)> = sqlx::query_as("SELECT article_id FROM variants WHERE id = $1")
            .bind(variant_id).fetch_optional(&mut *tx).await?;
        let Some((article_id,)) = parent else {
            tx.rollback().await?;
            return Err(StoreError::RowMissing { table: "variants", id: variant_id });
        };

        // Serializes re-aggregation per article.
        let locked: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE id = $1 FOR UPDATE")
            .bind(article_id).fetch_optional(&mut *tx).await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Err(StoreError::RowMissing { table: "articles", id: article_id });
        }

        let updated = sqlx::query_as::<_, Variant>(&format!(
            "UPDATE variants SET stock_unitario = $2 WHERE id = $1 AND stock_unitario = $3 RETURNING {VARIANT_COLUMNS}"
        ))
        .bind(variant_id).bind(new_stock).bind(expected)
        .fetch_optional(&mut *tx).await?;
        let Some(variant) = updated else {
            tx.rollback().await?;
            return Err(StoreError::Conflict);
        };

        let movement = match movement {
            Some(m) => Some(insert_movement(&mut *tx, m).await?),
            None => None,
        };

        let article = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET total_stock = (SELECT COALESCE(SUM(stock_unitario), 0) FROM variants WHERE article_id = $1), \
             updated_at = NOW() WHERE id = $1 RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article_id).fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(VariantCommit { variant, article, movement })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_timestamp_taken_at_insert() {
        assert!(INSERT_MOVEMENT.contains("clock_timestamp()"));
        assert!(!INSERT_MOVEMENT.contains("NOW()"));
        assert!(INSERT_MOVEMENT.ends_with(MOVEMENT_COLUMNS));
    }

    #[test]
    fn test_column_default_follows_insert_order() {
        let migration = include_str!("../../migrations/20240102000000_movement_clock_timestamp.sql");
        assert!(migration.contains("SET DEFAULT clock_timestamp()"));
    }
}
