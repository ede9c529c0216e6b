//! Reusable test helpers for webhook integration tests.
//!
//! Provides [`TestApp`] for driving the service directly or through the full
//! axum router, plus [`ScriptedTransport`], an in-process stand-in for
//! receiving endpoints that records every attempt with its tokio instant.
//!
//! ## Virtual Time
//!
//! Retry tests run under `#[tokio::test(start_paused = true)]`; use
//! [`wait_until`] to let the runtime auto-advance until a condition holds.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::time::Instant;
use tower::ServiceExt;
use uuid::Uuid;

use folio_server::api::{create_router, AppState};
use folio_server::config::Config;
use folio_server::webhooks::{
    Clock, DeliveryFailure, DeliveryStatus, NewEndpoint, WebhookDelivery, WebhookRequest,
    WebhookService, WebhookTransport,
};

// ============================================================================
// Scripted Transport
// ============================================================================

/// One attempt seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: WebhookRequest,
    pub at: Instant,
}

type Outcome = Result<u16, DeliveryFailure>;

/// Transport that answers from per-URL scripts instead of the network.
///
/// Each URL first drains its one-shot queue, then falls back to its
/// standing outcome, then to `200`.
#[derive(Default)]
pub struct ScriptedTransport {
    once: Mutex<HashMap<String, VecDeque<Outcome>>>,
    standing: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every attempt against `url` with `outcome`.
    pub fn always(&self, url: &str, outcome: Outcome) {
        self.standing
            .lock()
            .unwrap()
            .insert(url.to_string(), outcome);
    }

    /// Answer the next attempt against `url` with `outcome`.
    pub fn once(&self, url: &str, outcome: Outcome) {
        self.once
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.request.url == url)
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post(&self, request: &WebhookRequest) -> Result<u16, DeliveryFailure> {
        self.calls.lock().unwrap().push(RecordedCall {
            request: request.clone(),
            at: Instant::now(),
        });

        if let Some(outcome) = self
            .once
            .lock()
            .unwrap()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        self.standing
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(Ok(200))
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A webhook service backed by [`ScriptedTransport`], plus its router.
pub struct TestApp {
    pub router: Router,
    pub service: WebhookService,
    pub transport: Arc<ScriptedTransport>,
    pub config: Config,
}

impl TestApp {
    /// Create a test app on the system clock.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a test app whose timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::build(Some(clock))
    }

    fn build(clock: Option<Arc<dyn Clock>>) -> Self {
        let config = Config::default_for_test();
        let transport = ScriptedTransport::new();

        let mut builder = WebhookService::builder(config.webhook.clone())
            .transport(transport.clone() as Arc<dyn WebhookTransport>);
        if let Some(clock) = clock {
            builder = builder.clock(clock);
        }
        let service = builder.build().expect("Failed to build webhook service");

        let router = create_router(AppState::new(service.clone()));

        Self {
            router,
            service,
            transport,
            config,
        }
    }

    /// Register an active endpoint and return its id.
    pub async fn register(&self, url: &str, secret: &str, events: &[&str]) -> Uuid {
        self.service
            .register_endpoint(NewEndpoint::new(url, secret, events.iter().copied()))
            .await
    }

    /// All deliveries recorded for `endpoint_id`, newest first.
    pub async fn deliveries_for(&self, endpoint_id: Uuid) -> Vec<WebhookDelivery> {
        self.service
            .get_deliveries(usize::MAX)
            .await
            .into_iter()
            .filter(|d| d.endpoint_id == endpoint_id)
            .collect()
    }

    /// The single delivery recorded for `endpoint_id`.
    pub async fn only_delivery_for(&self, endpoint_id: Uuid) -> WebhookDelivery {
        let mut deliveries = self.deliveries_for(endpoint_id).await;
        assert_eq!(deliveries.len(), 1, "expected exactly one delivery");
        deliveries.remove(0)
    }

    /// Wait (in virtual time) until the delivery reaches `status`.
    pub async fn wait_for_status(&self, delivery_id: Uuid, status: DeliveryStatus) -> WebhookDelivery {
        let service = self.service.clone();
        wait_until(|| {
            let service = service.clone();
            async move {
                service
                    .get_delivery(delivery_id)
                    .await
                    .is_some_and(|d| d.status == status)
            }
        })
        .await;
        self.service
            .get_delivery(delivery_id)
            .await
            .expect("delivery disappeared")
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a JSON request.
    pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Self::request(method, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }
}

/// Poll `check` once per virtual second for up to an hour.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..3600 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("condition not met within an hour of virtual time");
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
