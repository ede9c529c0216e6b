//! Delivery Ledger
//!
//! History of delivery attempt sequences, upserted by delivery id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::types::{DeliveryStatus, WebhookDelivery};

/// Per-status totals across the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounts {
    pub total: usize,
    pub pending: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Storage for delivery records.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Insert or replace the record with this delivery's id.
    async fn record(&self, delivery: &WebhookDelivery);

    async fn get(&self, id: Uuid) -> Option<WebhookDelivery>;

    /// Most recent first by `created_at`, at most `limit` entries.
    async fn list(&self, limit: usize) -> Vec<WebhookDelivery>;

    /// Delete every record created before `cutoff`. Returns how many went.
    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> usize;

    async fn counts(&self) -> DeliveryCounts;
}

/// Process-local ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    deliveries: DashMap<Uuid, WebhookDelivery>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryLedger for InMemoryLedger {
    async fn record(&self, delivery: &WebhookDelivery) {
        self.deliveries.insert(delivery.id, delivery.clone());
    }

    async fn get(&self, id: Uuid) -> Option<WebhookDelivery> {
        self.deliveries.get(&id).map(|d| d.value().clone())
    }

    async fn list(&self, limit: usize) -> Vec<WebhookDelivery> {
        let mut items: Vec<WebhookDelivery> =
            self.deliveries.iter().map(|d| d.value().clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        items
    }

    async fn remove_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.deliveries.retain(|_, d| {
            let keep = d.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    async fn counts(&self) -> DeliveryCounts {
        self.deliveries
            .iter()
            .fold(DeliveryCounts::default(), |mut acc, d| {
                acc.total += 1;
                match d.status {
                    DeliveryStatus::Pending => acc.pending += 1,
                    DeliveryStatus::Delivered => acc.delivered += 1,
                    DeliveryStatus::Failed => acc.failed += 1,
                }
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::webhooks::types::WebhookPayload;

    fn delivery(created_at: DateTime<Utc>) -> WebhookDelivery {
        let payload = WebhookPayload {
            event: "project.created".into(),
            data: json!({}),
            timestamp: created_at,
            id: Uuid::new_v4(),
        };
        WebhookDelivery::new(Uuid::new_v4(), payload, 5, created_at)
    }

    #[tokio::test]
    async fn record_upserts_by_id() {
        let ledger = InMemoryLedger::new();
        let mut d = delivery(Utc::now());
        ledger.record(&d).await;

        d.attempts = 1;
        d.status = DeliveryStatus::Delivered;
        ledger.record(&d).await;

        let all = ledger.list(100).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, DeliveryStatus::Delivered);
        assert_eq!(all[0].attempts, 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        let old = delivery(now - Duration::hours(2));
        let mid = delivery(now - Duration::hours(1));
        let new = delivery(now);
        for d in [&mid, &new, &old] {
            ledger.record(d).await;
        }

        let ids: Vec<Uuid> = ledger.list(100).await.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![new.id, mid.id, old.id]);

        let limited = ledger.list(2).await;
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, new.id);
        assert!(ledger.list(0).await.is_empty());
    }

    #[tokio::test]
    async fn remove_older_than_keeps_boundary() {
        let ledger = InMemoryLedger::new();
        let cutoff = Utc::now() - Duration::days(30);
        let stale = delivery(cutoff - Duration::seconds(1));
        let boundary = delivery(cutoff);
        let fresh = delivery(Utc::now());
        for d in [&stale, &boundary, &fresh] {
            ledger.record(d).await;
        }

        assert_eq!(ledger.remove_older_than(cutoff).await, 1);
        assert_eq!(ledger.remove_older_than(cutoff).await, 0);
        assert!(ledger.get(stale.id).await.is_none());
        assert!(ledger.get(boundary.id).await.is_some());
    }

    #[tokio::test]
    async fn counts_by_status() {
        let ledger = InMemoryLedger::new();
        let mut failed = delivery(Utc::now());
        failed.status = DeliveryStatus::Failed;
        let mut delivered = delivery(Utc::now());
        delivered.status = DeliveryStatus::Delivered;
        let pending = delivery(Utc::now());
        for d in [&failed, &delivered, &pending] {
            ledger.record(d).await;
        }

        assert_eq!(
            ledger.counts().await,
            DeliveryCounts {
                total: 3,
                pending: 1,
                delivered: 1,
                failed: 1,
            }
        );
    }
}
