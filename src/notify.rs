//! Publishes committed stock events to NATS.

use tracing::warn;

use crate::domain::events::DomainEvent;

/// Publisher for stock events. Without a client every publish is a no-op.
#[derive(Clone, Default)]
pub struct StockNotifier {
    client: Option<async_nats::Client>,
}

impl StockNotifier {
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub async fn connect(url: &str) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client: Some(client) })
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Runs after the unit of work committed, so failures are logged only.
    pub async fn publish(&self, events: &[DomainEvent]) {
        let Some(client) = &self.client else { return };
        for event in events {
            let payload = match serde_json::to_vec(event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(subject = event.subject(), error = %e, "could not serialize stock event");
                    continue;
                }
            };
            if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
                warn!(subject = event.subject(), article_id = event.article_id(), error = %e, "stock event not published");
            }
        }
    }
}

impl std::fmt::Debug for StockNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockNotifier").field("enabled", &self.is_enabled()).finish()
    }
}
