//! API Router
//!
//! Central routing configuration for the HTTP surface.

use axum::extract::{FromRef, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::webhooks::{handlers, WebhookService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Webhook subsystem handle
    pub webhooks: WebhookService,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub const fn new(webhooks: WebhookService) -> Self {
        Self { webhooks }
    }
}

impl FromRef<AppState> for WebhookService {
    fn from_ref(state: &AppState) -> Self {
        state.webhooks.clone()
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/webhooks", webhooks_router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Operator routes for the webhook subsystem.
fn webhooks_router() -> Router<AppState> {
    Router::new()
        .route(
            "/endpoints",
            get(handlers::list_endpoints).post(handlers::create_endpoint),
        )
        .route(
            "/endpoints/{id}",
            patch(handlers::update_endpoint).delete(handlers::delete_endpoint),
        )
        .route("/send", post(handlers::send_webhook))
        .route("/deliveries", get(handlers::list_deliveries))
        .route("/stats", get(handlers::stats))
        .route("/cleanup", post(handlers::cleanup))
        .route("/verify", post(handlers::verify_signature))
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Retries currently queued
    queued_retries: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        queued_retries: state.webhooks.scheduled_retries().len(),
    })
}
