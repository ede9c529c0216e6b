//! Webhook Types
//!
//! Data structures for endpoints, payloads, deliveries and stats.

use std::collections::BTreeSet;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Event pattern that subscribes an endpoint to every event.
pub const WILDCARD_EVENT: &str = "*";

/// A registered delivery target (includes signing secret for delivery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub url: String,
    pub secret: String,
    pub events: BTreeSet<String>,
    pub is_active: bool,
    /// Consecutive failed attempts since the last success.
    pub retry_count: u32,
    pub last_delivery: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    /// Whether this endpoint's patterns cover `event` (literal name or `*`).
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.contains(event) || self.events.contains(WILDCARD_EVENT)
    }
}

/// Registration input for a new endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEndpoint {
    pub url: String,
    pub secret: String,
    pub events: BTreeSet<String>,
    pub is_active: bool,
}

impl NewEndpoint {
    /// Create an active endpoint subscribed to `events`.
    pub fn new<I, S>(url: impl Into<String>, secret: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: url.into(),
            secret: secret.into(),
            events: events.into_iter().map(Into::into).collect(),
            is_active: true,
        }
    }

    /// Set whether the endpoint takes part in fan-out.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub(crate) fn into_endpoint(self, id: Uuid, created_at: DateTime<Utc>) -> WebhookEndpoint {
        WebhookEndpoint {
            id,
            url: self.url,
            secret: self.secret,
            events: self.events,
            is_active: self.is_active,
            retry_count: 0,
            last_delivery: None,
            last_error: None,
            created_at,
        }
    }
}

/// Partial update merged into an existing endpoint. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointUpdate {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<BTreeSet<String>>,
    pub is_active: Option<bool>,
    pub retry_count: Option<u32>,
    pub last_delivery: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl EndpointUpdate {
    /// Merge the supplied fields into `endpoint`.
    pub fn apply_to(self, endpoint: &mut WebhookEndpoint) {
        if let Some(url) = self.url {
            endpoint.url = url;
        }
        if let Some(secret) = self.secret {
            endpoint.secret = secret;
        }
        if let Some(events) = self.events {
            endpoint.events = events;
        }
        if let Some(is_active) = self.is_active {
            endpoint.is_active = is_active;
        }
        if let Some(retry_count) = self.retry_count {
            endpoint.retry_count = retry_count;
        }
        if let Some(last_delivery) = self.last_delivery {
            endpoint.last_delivery = Some(last_delivery);
        }
        if let Some(last_error) = self.last_error {
            endpoint.last_error = Some(last_error);
        }
    }
}

/// Body sent to every endpoint for one `send_webhook` call.
///
/// Field order is the wire order; `data` objects serialize with sorted keys,
/// so the signed bytes are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
}

/// Lifecycle state of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// `delivered` and `failed` are absorbing.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payload's attempt sequence against one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event: String,
    pub payload: WebhookPayload,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_retry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WebhookDelivery {
    /// A fresh `pending` delivery with no attempts made.
    pub fn new(
        endpoint_id: Uuid,
        payload: WebhookPayload,
        max_attempts: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            event: payload.event.clone(),
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts,
            next_retry: None,
            created_at,
            delivered_at: None,
            error: None,
        }
    }
}

/// Synchronous outcome of a `send_webhook` fan-out.
///
/// `failed` counts every endpoint whose first attempt did not succeed,
/// including those now waiting on a retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: usize,
    pub failed: usize,
}

/// Point-in-time counts over the registry and ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookStats {
    pub endpoints: usize,
    pub active_endpoints: usize,
    pub pending_deliveries: usize,
    pub failed_deliveries: usize,
    pub total_deliveries: usize,
}

/// Endpoint listing entry (no signing secret).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    pub events: BTreeSet<String>,
    pub is_active: bool,
    pub retry_count: u32,
    pub last_delivery: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            events: endpoint.events,
            is_active: endpoint.is_active,
            retry_count: endpoint.retry_count,
            last_delivery: endpoint.last_delivery,
            last_error: endpoint.last_error,
            created_at: endpoint.created_at,
        }
    }
}

/// Endpoint response returned on creation (includes signing secret once).
#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointCreatedResponse {
    pub id: Uuid,
    pub url: String,
    pub secret: String,
    pub events: BTreeSet<String>,
    pub is_active: bool,
}

/// Request to register an endpoint. A secret is generated when omitted.
#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    pub url: String,
    pub events: BTreeSet<String>,
    pub secret: Option<String>,
    pub is_active: Option<bool>,
}

/// Request to update an endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateEndpointRequest {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<BTreeSet<String>>,
    pub is_active: Option<bool>,
}

/// Request to fan an event out to subscribers.
#[derive(Debug, Deserialize)]
pub struct SendWebhookRequest {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub endpoint_ids: Option<Vec<Uuid>>,
}

/// Request to check an inbound webhook signature.
#[derive(Debug, Deserialize)]
pub struct VerifySignatureRequest {
    pub payload: String,
    pub signature: String,
    pub secret: String,
}

/// Why a single delivery attempt failed. `Display` is what gets recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to sign payload: {0}")]
    Signing(String),
    #[error("Endpoint no longer exists")]
    EndpointRemoved,
    #[error("Endpoint is inactive")]
    EndpointInactive,
}

/// Webhook errors.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Webhook endpoint not found")]
    NotFound,
    #[error("Validation: {0}")]
    Validation(String),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<WebhookError> for (StatusCode, String) {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::HttpClient(e) => {
                tracing::error!("HTTP client error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            WebhookError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
            WebhookError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        }
    }
}
