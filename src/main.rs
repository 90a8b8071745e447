//! Stock Ledger - stock consistency service for the retail back-office

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use stock_ledger::{api, config::Config, notify::StockNotifier, store::PgStockStore, StockCoordinator};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let db = PgPoolOptions::new().max_connections(config.max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let notifier = match &config.nats_url {
        Some(url) => StockNotifier::connect(url).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "NATS unavailable, stock events will not be published");
            StockNotifier::disabled()
        }),
        None => StockNotifier::disabled(),
    };
    let coordinator = StockCoordinator::new(Arc::new(PgStockStore::new(db)))
        .with_max_retries(config.max_retries)
        .with_notifier(notifier);

    let app = api::router(Arc::new(coordinator)).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("Stock ledger listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
