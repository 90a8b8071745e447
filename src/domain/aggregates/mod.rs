//! Aggregates module
pub mod article;
pub mod variant;

pub use article::{aggregate_total, ArticleStock, Consumption};
pub use variant::VariantStock;
