//! Delivery history retention.
//!
//! Periodically purges deliveries older than the configured retention
//! window. Endpoints are never touched.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::dispatch::WebhookService;

/// Start the periodic cleanup task.
///
/// The first tick is consumed immediately so no purge runs during startup.
pub fn spawn_cleanup_task(
    service: WebhookService,
    every: Duration,
    retention_days: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // consume immediate first tick
        loop {
            interval.tick().await;
            run_cleanup_cycle(&service, retention_days).await;
        }
    })
}

#[tracing::instrument(skip(service))]
async fn run_cleanup_cycle(service: &WebhookService, retention_days: u32) {
    let start = std::time::Instant::now();
    let removed = service.cleanup_old_deliveries(retention_days).await;
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        removed,
        "Webhook retention cycle completed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    use super::*;
    use crate::config::WebhookConfig;
    use crate::webhooks::clock::ManualClock;
    use crate::webhooks::transport::{WebhookRequest, WebhookTransport};
    use crate::webhooks::types::{DeliveryFailure, NewEndpoint};

    struct AlwaysOk;

    #[async_trait::async_trait]
    impl WebhookTransport for AlwaysOk {
        async fn post(&self, _request: &WebhookRequest) -> Result<u16, DeliveryFailure> {
            Ok(200)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn purges_on_each_tick() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = WebhookService::builder(WebhookConfig::default())
            .transport(Arc::new(AlwaysOk))
            .clock(clock.clone())
            .build()
            .unwrap();
        service
            .register_endpoint(NewEndpoint::new("https://example.com", "k", ["*"]))
            .await;
        service.send_webhook("x", json!({}), None).await;
        assert_eq!(service.get_stats().await.total_deliveries, 1);

        clock.advance(ChronoDuration::days(31));
        let handle = spawn_cleanup_task(service.clone(), Duration::from_secs(60), 30);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.get_stats().await.total_deliveries, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.get_stats().await.total_deliveries, 0);

        handle.abort();
    }
}
