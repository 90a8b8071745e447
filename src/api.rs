//! HTTP surface over the coordinator.

use std::sync::Arc;

use axum::{extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post, put}, Json, Router};
use serde::Deserialize;
use serde_json::json;
use validator::{Validate, ValidationErrors};

use crate::coordinator::{ArticleAdjustment, LedgerAudit, SaleConsumption, StockReturn, VariantAdjustment};
use crate::{MovementDirection, MovementOrigin, StockCoordinator, StockError, StockMovement};

#[derive(Clone)] pub struct AppState { pub coordinator: Arc<StockCoordinator> }

pub fn router(coordinator: Arc<StockCoordinator>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "stock-ledger"})) }))
        .route("/api/v1/articles/:id/consumptions", post(consume))
        .route("/api/v1/articles/:id/returns", post(credit_note_return))
        .route("/api/v1/articles/:id/stock", put(adjust_article))
        .route("/api/v1/articles/:id/movements", get(movement_history).post(record_movement))
        .route("/api/v1/articles/:id/audit", get(audit))
        .route("/api/v1/variants/:id/stock", put(adjust_variant))
        .with_state(AppState { coordinator })
}

#[derive(Debug)]
pub enum ApiError { Stock(StockError), Invalid(ValidationErrors) }

impl From<StockError> for ApiError { fn from(e: StockError) -> Self { Self::Stock(e) } }
impl From<ValidationErrors> for ApiError { fn from(e: ValidationErrors) -> Self { Self::Invalid(e) } }

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Invalid(e) => (StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
            Self::Stock(e) => {
                let (status, code) = match &e {
                    StockError::ArticleNotFound(_) | StockError::VariantNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                    StockError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                    StockError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
                    StockError::Persistence { .. } | StockError::VariantPersistence { .. } => {
                        tracing::error!(error = %e, "stock write failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
                    }
                };
                (status, code, e.to_string())
            }
        };
        (status, Json(json!({"error": code, "message": message}))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize, Validate)] pub struct ConsumeRequest { #[validate(range(min = 1))] pub quantity: i64, pub order_id: i64, #[validate(length(min = 1))] pub source_tag: String }
#[derive(Debug, Deserialize, Validate)] pub struct ReturnRequest { #[validate(range(min = 1))] pub quantity: i64, pub order_id: i64 }
#[derive(Debug, Deserialize, Validate)] pub struct ArticleStockRequest { #[validate(range(min = 0))] pub total_stock: i64 }
#[derive(Debug, Deserialize, Validate)] pub struct VariantStockRequest { #[validate(range(min = 0))] pub stock_unitario: i64 }
#[derive(Debug, Deserialize, Validate)] pub struct RecordMovementRequest { pub order_id: Option<i64>, pub origin: MovementOrigin, pub direction: MovementDirection, #[validate(range(min = 1))] pub quantity: i64 }

async fn consume(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<ConsumeRequest>) -> ApiResult<SaleConsumption> {
    r.validate()?;
    Ok(Json(s.coordinator.apply_sale_consumption(id, r.quantity, r.order_id, &r.source_tag).await?))
}

async fn credit_note_return(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<ReturnRequest>) -> ApiResult<StockReturn> {
    r.validate()?;
    Ok(Json(s.coordinator.apply_credit_note_return(id, r.quantity, r.order_id).await?))
}

async fn adjust_article(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<ArticleStockRequest>) -> ApiResult<ArticleAdjustment> {
    r.validate()?;
    Ok(Json(s.coordinator.apply_article_adjustment(id, r.total_stock).await?))
}

async fn adjust_variant(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<VariantStockRequest>) -> ApiResult<VariantAdjustment> {
    r.validate()?;
    Ok(Json(s.coordinator.apply_variant_adjustment(id, r.stock_unitario).await?))
}

async fn record_movement(State(s): State<AppState>, Path(id): Path<i64>, Json(r): Json<RecordMovementRequest>) -> Result<(StatusCode, Json<StockMovement>), ApiError> {
    r.validate()?;
    let m = s.coordinator.record_movement(id, r.order_id, r.origin, r.direction, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(m)))
}

async fn movement_history(State(s): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<StockMovement>> {
    Ok(Json(s.coordinator.movement_history(id).await?))
}

async fn audit(State(s): State<AppState>, Path(id): Path<i64>) -> ApiResult<LedgerAudit> {
    Ok(Json(s.coordinator.audit_article(id).await?))
}
