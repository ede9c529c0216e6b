//! Webhook Delivery Engine
//!
//! Signs and POSTs payloads, records every attempt in the ledger, and
//! schedules retries from the delay table until an attempt succeeds or
//! `max_attempts` is reached.
//!
//! State machine per delivery:
//! - `pending -> delivered` on a 2xx response
//! - `pending -> pending` after a failed attempt with attempts left (retry queued)
//! - `pending -> failed` when attempts run out or the endpoint is gone/inactive

use std::sync::Arc;

use chrono::SecondsFormat;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::ledger::DeliveryLedger;
use super::registry::EndpointRegistry;
use super::scheduler::RetryScheduler;
use super::transport::{WebhookRequest, WebhookTransport};
use super::types::{DeliveryFailure, DeliveryStatus, WebhookDelivery, WebhookEndpoint, WebhookPayload};
use crate::config::WebhookConfig;

/// Owns the stores, the transport and the retry queue.
pub struct DeliveryEngine {
    pub(crate) registry: Arc<dyn EndpointRegistry>,
    pub(crate) ledger: Arc<dyn DeliveryLedger>,
    pub(crate) transport: Arc<dyn WebhookTransport>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scheduler: RetryScheduler,
    pub(crate) config: WebhookConfig,
}

impl DeliveryEngine {
    /// First delivery of `payload` to `endpoint`. Returns whether it succeeded.
    ///
    /// The pending record is stored before the network call.
    pub async fn deliver(&self, endpoint: &WebhookEndpoint, payload: &WebhookPayload) -> bool {
        let mut delivery = WebhookDelivery::new(
            endpoint.id,
            payload.clone(),
            self.config.max_attempts,
            self.clock.now(),
        );
        self.ledger.record(&delivery).await;

        self.attempt(endpoint, &mut delivery).await
    }

    /// Fire a queued retry.
    ///
    /// No-op if the delivery was removed or already resolved. If the endpoint
    /// was unregistered or deactivated meanwhile, the delivery fails without
    /// another attempt.
    pub async fn retry_delivery(&self, delivery_id: Uuid) {
        let Some(mut delivery) = self.ledger.get(delivery_id).await else {
            debug!(delivery_id = %delivery_id, "Retry fired for unknown delivery, skipping");
            return;
        };

        if delivery.status.is_terminal() {
            debug!(
                delivery_id = %delivery_id,
                status = %delivery.status,
                "Retry fired for resolved delivery, skipping"
            );
            return;
        }

        match self.registry.get(delivery.endpoint_id).await {
            None => self.abandon(&mut delivery, &DeliveryFailure::EndpointRemoved).await,
            Some(endpoint) if !endpoint.is_active => {
                self.abandon(&mut delivery, &DeliveryFailure::EndpointInactive).await;
            }
            Some(endpoint) => {
                self.attempt(&endpoint, &mut delivery).await;
            }
        }
    }

    /// One HTTP attempt plus the bookkeeping for its outcome.
    async fn attempt(&self, endpoint: &WebhookEndpoint, delivery: &mut WebhookDelivery) -> bool {
        let result = self.send(endpoint, &delivery.payload).await;
        delivery.attempts += 1;
        let now = self.clock.now();

        match result {
            Ok(()) => {
                delivery.status = DeliveryStatus::Delivered;
                delivery.delivered_at = Some(now);
                delivery.next_retry = None;
                self.ledger.record(delivery).await;
                self.registry.record_success(endpoint.id, now).await;

                info!(
                    webhook_id = %endpoint.id,
                    delivery_id = %delivery.id,
                    event = %delivery.event,
                    attempt = delivery.attempts,
                    "Webhook delivered"
                );
                true
            }
            Err(failure) => {
                let message = failure.to_string();
                delivery.error = Some(message.clone());
                self.registry.record_failure(endpoint.id, &message).await;

                if delivery.attempts < delivery.max_attempts {
                    let delay = self.config.retry_delay(delivery.attempts);
                    let due_at = chrono::Duration::from_std(delay)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(now);
                    delivery.next_retry = Some(due_at);
                    self.ledger.record(delivery).await;
                    self.scheduler.schedule(delivery.id, delay, due_at);

                    warn!(
                        webhook_id = %endpoint.id,
                        delivery_id = %delivery.id,
                        attempt = delivery.attempts,
                        retry_in_secs = delay.as_secs(),
                        error = %message,
                        "Webhook delivery failed, retry scheduled"
                    );
                } else {
                    delivery.status = DeliveryStatus::Failed;
                    delivery.next_retry = None;
                    self.ledger.record(delivery).await;

                    error!(
                        webhook_id = %endpoint.id,
                        delivery_id = %delivery.id,
                        attempts = delivery.attempts,
                        error = %message,
                        "Webhook delivery exhausted all attempts"
                    );
                }
                false
            }
        }
    }

    /// Terminal failure without an attempt.
    async fn abandon(&self, delivery: &mut WebhookDelivery, failure: &DeliveryFailure) {
        delivery.status = DeliveryStatus::Failed;
        delivery.next_retry = None;
        delivery.error = Some(failure.to_string());
        self.ledger.record(delivery).await;

        warn!(
            webhook_id = %delivery.endpoint_id,
            delivery_id = %delivery.id,
            reason = %failure,
            "Webhook retry abandoned"
        );
    }

    /// Sign and POST; any non-2xx status is a failure.
    async fn send(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryFailure> {
        let (body, signature) = folio_crypto::sign_json(&endpoint.secret, payload)
            .map_err(|e| DeliveryFailure::Signing(e.to_string()))?;

        let request = WebhookRequest {
            url: endpoint.url.clone(),
            body,
            signature,
            event: payload.event.clone(),
            payload_id: payload.id,
            timestamp: payload.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let status = self.transport.post(&request).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DeliveryFailure::Status(status))
        }
    }
}
