//! Outbound HTTP transport for webhook attempts.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::types::DeliveryFailure;
use crate::config::WebhookConfig;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const ID_HEADER: &str = "X-Webhook-ID";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// A fully signed request ready to POST.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    /// Serialized payload; exactly the bytes that were signed.
    pub body: Vec<u8>,
    /// Lowercase hex HMAC-SHA256 of `body`.
    pub signature: String,
    pub event: String,
    pub payload_id: Uuid,
    pub timestamp: String,
}

/// Sends one attempt and reports the response status.
///
/// Non-2xx statuses are returned as `Ok`; classification is the caller's job.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: &WebhookRequest) -> Result<u16, DeliveryFailure>;
}

/// `reqwest`-backed transport with a fixed timeout and user agent.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            timeout: config.request_timeout,
        })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: &WebhookRequest) -> Result<u16, DeliveryFailure> {
        let result = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &request.signature)
            .header(EVENT_HEADER, &request.event)
            .header(ID_HEADER, request.payload_id.to_string())
            .header(TIMESTAMP_HEADER, &request.timestamp)
            .body(request.body.clone())
            .send()
            .await;

        match result {
            Ok(resp) => Ok(resp.status().as_u16()),
            Err(e) if e.is_timeout() => Err(DeliveryFailure::Timeout(self.timeout.as_secs())),
            Err(e) => Err(DeliveryFailure::Network(e.to_string())),
        }
    }
}
