//! Webhook Event Dispatch
//!
//! [`WebhookService`] is the entry point collaborators use: endpoint
//! registration, fan-out of events to subscribers, and read-only
//! introspection of the registry and ledger.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::delivery::DeliveryEngine;
use super::ledger::{DeliveryLedger, InMemoryLedger};
use super::registry::{EndpointRegistry, InMemoryRegistry};
use super::scheduler::{RetryScheduler, ScheduledRetry};
use super::stats;
use super::transport::{HttpTransport, WebhookTransport};
use super::types::{
    EndpointUpdate, NewEndpoint, SendResult, WebhookDelivery, WebhookEndpoint, WebhookError,
    WebhookPayload, WebhookStats,
};
use crate::config::WebhookConfig;

/// Default page size for [`WebhookService::get_deliveries`].
pub const DEFAULT_DELIVERY_LIMIT: usize = 100;

/// Handle to the webhook subsystem. Cheap to clone.
#[derive(Clone)]
pub struct WebhookService {
    engine: Arc<DeliveryEngine>,
}

/// Wires stores, transport and clock into a [`WebhookService`].
///
/// Anything not supplied falls back to the in-memory stores, the reqwest
/// transport and the system clock.
pub struct WebhookServiceBuilder {
    config: WebhookConfig,
    registry: Option<Arc<dyn EndpointRegistry>>,
    ledger: Option<Arc<dyn DeliveryLedger>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl WebhookServiceBuilder {
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn EndpointRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn ledger(mut self, ledger: Arc<dyn DeliveryLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the service and start its retry scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<WebhookService, WebhookError> {
        let transport: Arc<dyn WebhookTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let (scheduler, due) = RetryScheduler::spawn();
        let engine = Arc::new(DeliveryEngine {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(InMemoryRegistry::new())),
            ledger: self.ledger.unwrap_or_else(|| Arc::new(InMemoryLedger::new())),
            transport,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            scheduler,
            config: self.config,
        });

        spawn_retry_pump(Arc::downgrade(&engine), due);

        Ok(WebhookService { engine })
    }
}

/// Run each due retry on its own task so deliveries retry independently.
fn spawn_retry_pump(engine: Weak<DeliveryEngine>, mut due: mpsc::UnboundedReceiver<Uuid>) {
    tokio::spawn(async move {
        while let Some(delivery_id) = due.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                engine.retry_delivery(delivery_id).await;
            });
        }
    });
}

impl WebhookService {
    pub fn builder(config: WebhookConfig) -> WebhookServiceBuilder {
        WebhookServiceBuilder {
            config,
            registry: None,
            ledger: None,
            transport: None,
            clock: None,
        }
    }

    /// In-memory service delivering over HTTP.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.engine.config
    }

    /// Register an endpoint and return its generated id. Always succeeds.
    pub async fn register_endpoint(&self, endpoint: NewEndpoint) -> Uuid {
        let id = Uuid::new_v4();
        let record = endpoint.into_endpoint(id, self.engine.clock.now());
        debug!(webhook_id = %id, url = %record.url, events = ?record.events, "Registering webhook endpoint");
        self.engine.registry.insert(record).await;
        id
    }

    /// Remove an endpoint. Its deliveries stay in the ledger.
    pub async fn unregister_endpoint(&self, id: Uuid) -> bool {
        let removed = self.engine.registry.remove(id).await;
        if removed {
            info!(webhook_id = %id, "Webhook endpoint unregistered");
        }
        removed
    }

    pub async fn update_endpoint(&self, id: Uuid, update: EndpointUpdate) -> bool {
        self.engine.registry.update(id, update).await
    }

    pub async fn get_endpoint(&self, id: Uuid) -> Option<WebhookEndpoint> {
        self.engine.registry.get(id).await
    }

    pub async fn get_endpoints(&self) -> Vec<WebhookEndpoint> {
        self.engine.registry.list().await
    }

    /// Active endpoints subscribed to `event`, optionally restricted to `targets`.
    pub async fn matching_endpoints(
        &self,
        event: &str,
        targets: Option<&[Uuid]>,
    ) -> Vec<WebhookEndpoint> {
        self.engine.registry.matching(event, targets).await
    }

    /// Fan `event` out to every matching active endpoint concurrently.
    ///
    /// Counts reflect first attempts only: an endpoint now waiting on a
    /// retry is counted as failed, and later retries never change the result.
    pub async fn send_webhook(
        &self,
        event: &str,
        data: serde_json::Value,
        targets: Option<&[Uuid]>,
    ) -> SendResult {
        let payload = WebhookPayload {
            event: event.to_string(),
            data,
            timestamp: self.engine.clock.now(),
            id: Uuid::new_v4(),
        };

        let endpoints = self.engine.registry.matching(event, targets).await;
        if endpoints.is_empty() {
            debug!(event = %event, "No webhook endpoints subscribed to event");
            return SendResult::default();
        }

        let outcomes = join_all(
            endpoints
                .iter()
                .map(|endpoint| self.engine.deliver(endpoint, &payload)),
        )
        .await;

        let success = outcomes.iter().filter(|delivered| **delivered).count();
        let result = SendResult {
            success,
            failed: outcomes.len() - success,
        };

        info!(
            event = %event,
            payload_id = %payload.id,
            success = result.success,
            failed = result.failed,
            "Webhook fan-out complete"
        );
        result
    }

    /// Most recent deliveries first.
    pub async fn get_deliveries(&self, limit: usize) -> Vec<WebhookDelivery> {
        self.engine.ledger.list(limit).await
    }

    pub async fn get_delivery(&self, id: Uuid) -> Option<WebhookDelivery> {
        self.engine.ledger.get(id).await
    }

    pub async fn get_stats(&self) -> WebhookStats {
        stats::collect(self.engine.registry.as_ref(), self.engine.ledger.as_ref()).await
    }

    /// Delete deliveries created more than `days_to_keep` days ago.
    pub async fn cleanup_old_deliveries(&self, days_to_keep: u32) -> usize {
        let cutoff = self
            .engine
            .clock
            .now()
            .checked_sub_signed(Duration::days(i64::from(days_to_keep)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.engine.ledger.remove_older_than(cutoff).await;
        info!(removed, days_to_keep, "Cleaned up old webhook deliveries");
        removed
    }

    /// Retries currently waiting in the queue.
    pub fn scheduled_retries(&self) -> Vec<ScheduledRetry> {
        self.engine.scheduler.scheduled()
    }

    /// Check a signature a receiver got alongside `payload`.
    pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> bool {
        folio_crypto::verify_signature(secret, payload.as_bytes(), signature)
    }

    /// Stop the retry scheduler. Queued retries are dropped.
    pub fn shutdown(&self) {
        self.engine.scheduler.shutdown();
    }
}
