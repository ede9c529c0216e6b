//! Endpoint Registry
//!
//! Endpoint id → endpoint record. Single-record mutations are atomic with
//! respect to each other, so concurrent attempts never lose a
//! `retry_count` increment or `last_error` write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::types::{EndpointUpdate, WebhookEndpoint};

/// Storage for registered endpoints.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Store a new record. Ids are generated by the caller.
    async fn insert(&self, endpoint: WebhookEndpoint);

    /// Remove a record, returning whether it existed.
    async fn remove(&self, id: Uuid) -> bool;

    async fn get(&self, id: Uuid) -> Option<WebhookEndpoint>;

    /// All records, oldest registration first.
    async fn list(&self) -> Vec<WebhookEndpoint>;

    /// Merge `update` into the record. `false` if the id is unknown.
    async fn update(&self, id: Uuid, update: EndpointUpdate) -> bool;

    /// Record a successful delivery: set `last_delivery`, reset `retry_count`
    /// and clear `last_error`.
    async fn record_success(&self, id: Uuid, at: DateTime<Utc>) -> bool;

    /// Record a failed attempt: bump `retry_count`, set `last_error`.
    async fn record_failure(&self, id: Uuid, error: &str) -> bool;

    /// Active endpoints subscribed to `event`, optionally restricted to `targets`.
    async fn matching(&self, event: &str, targets: Option<&[Uuid]>) -> Vec<WebhookEndpoint> {
        self.list()
            .await
            .into_iter()
            .filter(|e| e.is_active && e.subscribes_to(event))
            .filter(|e| targets.map_or(true, |ids| ids.contains(&e.id)))
            .collect()
    }
}

/// Process-local registry.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    endpoints: DashMap<Uuid, WebhookEndpoint>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EndpointRegistry for InMemoryRegistry {
    async fn insert(&self, endpoint: WebhookEndpoint) {
        self.endpoints.insert(endpoint.id, endpoint);
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.endpoints.remove(&id).is_some()
    }

    async fn get(&self, id: Uuid) -> Option<WebhookEndpoint> {
        self.endpoints.get(&id).map(|e| e.value().clone())
    }

    async fn list(&self) -> Vec<WebhookEndpoint> {
        let mut items: Vec<WebhookEndpoint> =
            self.endpoints.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }

    async fn update(&self, id: Uuid, update: EndpointUpdate) -> bool {
        match self.endpoints.get_mut(&id) {
            Some(mut endpoint) => {
                update.apply_to(&mut endpoint);
                true
            }
            None => false,
        }
    }

    async fn record_success(&self, id: Uuid, at: DateTime<Utc>) -> bool {
        match self.endpoints.get_mut(&id) {
            Some(mut endpoint) => {
                endpoint.last_delivery = Some(at);
                endpoint.retry_count = 0;
                endpoint.last_error = None;
                true
            }
            None => false,
        }
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> bool {
        match self.endpoints.get_mut(&id) {
            Some(mut endpoint) => {
                endpoint.retry_count = endpoint.retry_count.saturating_add(1);
                endpoint.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }
}
