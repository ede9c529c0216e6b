//! Outbound Webhooks
//!
//! HTTP POST delivery of application events to registered endpoints with
//! HMAC signing, scheduled retries, and a queryable delivery ledger.

pub mod clock;
pub mod delivery;
pub mod dispatch;
pub mod handlers;
pub mod ledger;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod stats;
pub mod transport;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{WebhookService, WebhookServiceBuilder, DEFAULT_DELIVERY_LIMIT};
pub use ledger::{DeliveryCounts, DeliveryLedger, InMemoryLedger};
pub use registry::{EndpointRegistry, InMemoryRegistry};
pub use retention::spawn_cleanup_task;
pub use scheduler::ScheduledRetry;
pub use transport::{HttpTransport, WebhookRequest, WebhookTransport};
pub use types::{
    DeliveryFailure, DeliveryStatus, EndpointUpdate, NewEndpoint, SendResult, WebhookDelivery,
    WebhookEndpoint, WebhookError, WebhookPayload, WebhookStats, WILDCARD_EVENT,
};
