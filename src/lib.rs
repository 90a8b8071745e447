//! Stock Ledger Service
//!
//! Keeps a retail back-office's stock figures consistent.
//!
//! ## Features
//! - Article aggregate stock (`total_stock`)
//! - Per size/color variant stock (`stock_unitario`)
//! - Append-only stock movement ledger with balance snapshots
//! - Sale consumption, credit-note returns and manual adjustments
//! - Ledger audit for balance and aggregate drift

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod api;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod ledger;
pub mod notify;
pub mod store;

pub use coordinator::StockCoordinator;
pub use ledger::StockLedger;
pub use store::{StockStore, StoreError};

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub total_stock: i64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub id: i64,
    pub article_id: i64,
    pub size_id: Option<i64>,
    pub color_id: Option<i64>,
    pub stock_unitario: i64,
}

/// A ledger row. Never updated or deleted once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub article_id: i64,
    /// Set on AJUSTE rows produced by a variant edit; `resulting_balance`
    /// is then the variant's balance.
    pub variant_id: Option<i64>,
    pub order_id: Option<i64>,
    pub origin: MovementOrigin,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub resulting_balance: i64,
}

/// A ledger row before the store assigns its id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub article_id: i64,
    pub variant_id: Option<i64>,
    pub order_id: Option<i64>,
    pub origin: MovementOrigin,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub resulting_balance: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementOrigin {
    #[serde(rename = "FACTURA")]
    Factura,
    #[serde(rename = "NOTA_DE_CREDITO")]
    NotaDeCredito,
    #[serde(rename = "AJUSTE")]
    Ajuste,
}

impl MovementOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factura => "FACTURA",
            Self::NotaDeCredito => "NOTA_DE_CREDITO",
            Self::Ajuste => "AJUSTE",
        }
    }

    /// Maps the tag a sale flow passes along (`"venta"`, `"FACTURA"`, ...) to an origin.
    pub fn from_source_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_uppercase().as_str() {
            "VENTA" | "FACTURA" => Ok(Self::Factura),
            "NOTA_DE_CREDITO" => Ok(Self::NotaDeCredito),
            "AJUSTE" => Ok(Self::Ajuste),
            _ => Err(StockError::Validation(format!("origen de movimiento desconocido: {tag}"))),
        }
    }
}

impl fmt::Display for MovementOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for MovementOrigin {
    type Err = StockError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FACTURA" => Ok(Self::Factura),
            "NOTA_DE_CREDITO" => Ok(Self::NotaDeCredito),
            "AJUSTE" => Ok(Self::Ajuste),
            other => Err(StockError::Validation(format!("origen de movimiento desconocido: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    /// Stock increase.
    Entrada,
    /// Stock decrease.
    Salida,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Entrada => "entrada", Self::Salida => "salida" }
    }
}

impl fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for MovementDirection {
    type Err = StockError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "entrada" => Ok(Self::Entrada),
            "salida" => Ok(Self::Salida),
            other => Err(StockError::Validation(format!("dirección de movimiento desconocida: {other}"))),
        }
    }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StockError {
    #[error("Artículo {0} no encontrado")]
    ArticleNotFound(i64),

    #[error("Variante {0} no encontrada")]
    VariantNotFound(i64),

    #[error("Datos inválidos: {0}")]
    Validation(String),

    #[error("El stock del artículo {article_id} cambió durante la operación (cantidad {quantity}, {attempts} intentos)")]
    Conflict { article_id: i64, quantity: i64, attempts: u32 },

    #[error("No se pudo actualizar el stock del artículo {article_id} (cantidad {quantity}): {source}")]
    Persistence {
        article_id: i64,
        quantity: i64,
        #[source]
        source: StoreError,
    },

    /// The variant itself could not be read, so its article is not known yet.
    #[error("No se pudo actualizar el stock de la variante {variant_id} (cantidad {quantity}): {source}")]
    VariantPersistence {
        variant_id: i64,
        quantity: i64,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, StockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags() {
        assert_eq!(MovementOrigin::from_source_tag("venta").unwrap(), MovementOrigin::Factura);
        assert_eq!(MovementOrigin::from_source_tag(" Factura ").unwrap(), MovementOrigin::Factura);
        assert_eq!(MovementOrigin::from_source_tag("NOTA_DE_CREDITO").unwrap(), MovementOrigin::NotaDeCredito);
        assert!(matches!(MovementOrigin::from_source_tag("regalo"), Err(StockError::Validation(_))));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&MovementOrigin::NotaDeCredito).unwrap(), "\"NOTA_DE_CREDITO\"");
        assert_eq!(serde_json::to_string(&MovementDirection::Salida).unwrap(), "\"salida\"");
        assert_eq!("AJUSTE".parse::<MovementOrigin>().unwrap(), MovementOrigin::Ajuste);
        assert!("SALIDA".parse::<MovementDirection>().is_err());
    }

    #[test]
    fn test_error_messages_name_article_and_quantity() {
        let err = StockError::Persistence { article_id: 7, quantity: 3, source: StoreError::Poisoned };
        let msg = err.to_string();
        assert!(msg.contains("artículo 7"));
        assert!(msg.contains("cantidad 3"));

        let err = StockError::VariantPersistence { variant_id: 10, quantity: 4, source: StoreError::Poisoned };
        let msg = err.to_string();
        assert!(msg.contains("variante 10"));
        assert!(!msg.contains("artículo 0"));
    }
}
