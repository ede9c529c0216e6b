//! Operational counts over the registry and ledger.

use super::ledger::DeliveryLedger;
use super::registry::EndpointRegistry;
use super::types::WebhookStats;

/// Aggregate fresh counts; nothing is cached.
pub async fn collect(
    registry: &dyn EndpointRegistry,
    ledger: &dyn DeliveryLedger,
) -> WebhookStats {
    let endpoints = registry.list().await;
    let deliveries = ledger.counts().await;

    WebhookStats {
        endpoints: endpoints.len(),
        active_endpoints: endpoints.iter().filter(|e| e.is_active).count(),
        pending_deliveries: deliveries.pending,
        failed_deliveries: deliveries.failed,
        total_deliveries: deliveries.total,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::webhooks::ledger::InMemoryLedger;
    use crate::webhooks::registry::InMemoryRegistry;
    use crate::webhooks::types::{DeliveryStatus, NewEndpoint, WebhookDelivery, WebhookPayload};

    #[tokio::test]
    async fn counts_endpoints_and_deliveries() {
        let registry = InMemoryRegistry::new();
        let ledger = InMemoryLedger::new();

        for active in [true, true, false] {
            let endpoint = NewEndpoint::new("https://example.com", "k", ["*"])
                .with_active(active)
                .into_endpoint(Uuid::new_v4(), Utc::now());
            registry.insert(endpoint).await;
        }

        let payload = WebhookPayload {
            event: "x".into(),
            data: json!({}),
            timestamp: Utc::now(),
            id: Uuid::new_v4(),
        };
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Failed,
            DeliveryStatus::Failed,
            DeliveryStatus::Delivered,
        ] {
            let mut d = WebhookDelivery::new(Uuid::new_v4(), payload.clone(), 5, Utc::now());
            d.status = status;
            ledger.record(&d).await;
        }

        assert_eq!(
            collect(&registry, &ledger).await,
            WebhookStats {
                endpoints: 3,
                active_endpoints: 2,
                pending_deliveries: 1,
                failed_deliveries: 2,
                total_deliveries: 4,
            }
        );
    }
}
