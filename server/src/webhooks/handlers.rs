//! Webhook API Handlers
//!
//! Operator endpoints for endpoint management, manual sends and
//! delivery introspection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dispatch::{WebhookService, DEFAULT_DELIVERY_LIMIT};
use super::types::{
    CreateEndpointRequest, EndpointCreatedResponse, EndpointUpdate, NewEndpoint, SendResult,
    SendWebhookRequest, UpdateEndpointRequest, VerifySignatureRequest, WebhookDelivery,
    WebhookEndpointResponse, WebhookError, WebhookStats,
};

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifySignatureResponse {
    pub valid: bool,
}

/// Validate a URL for webhook delivery.
fn validate_url(url: &str) -> Result<(), WebhookError> {
    if url.len() < 10 || url.len() > 2048 {
        return Err(WebhookError::Validation(
            "URL must be between 10 and 2048 characters".to_string(),
        ));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(WebhookError::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    let parsed = reqwest::Url::parse(url)
        .map_err(|_| WebhookError::Validation("Invalid URL format".to_string()))?;
    if parsed.host_str().is_none() {
        return Err(WebhookError::Validation(
            "URL must contain a host".to_string(),
        ));
    }

    Ok(())
}

fn validate_events<'a>(events: impl IntoIterator<Item = &'a String>) -> Result<(), WebhookError> {
    let mut any = false;
    for event in events {
        any = true;
        if event.trim().is_empty() {
            return Err(WebhookError::Validation(
                "Event names must not be empty".to_string(),
            ));
        }
    }
    if !any {
        return Err(WebhookError::Validation(
            "At least one subscribed event is required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/webhooks/endpoints
#[instrument(skip(service))]
pub async fn list_endpoints(
    State(service): State<WebhookService>,
) -> Json<Vec<WebhookEndpointResponse>> {
    let endpoints = service.get_endpoints().await;
    Json(endpoints.into_iter().map(Into::into).collect())
}

/// POST /api/webhooks/endpoints
#[instrument(skip(service, req), fields(url = %req.url))]
pub async fn create_endpoint(
    State(service): State<WebhookService>,
    Json(req): Json<CreateEndpointRequest>,
) -> ApiResult<(StatusCode, Json<EndpointCreatedResponse>)> {
    validate_url(&req.url)?;
    validate_events(&req.events)?;

    let secret = match req.secret {
        Some(secret) if secret.is_empty() => {
            return Err(WebhookError::Validation("Secret must not be empty".to_string()).into());
        }
        Some(secret) => secret,
        None => folio_crypto::generate_signing_secret(),
    };
    let is_active = req.is_active.unwrap_or(true);

    let endpoint = NewEndpoint {
        url: req.url.clone(),
        secret: secret.clone(),
        events: req.events.clone(),
        is_active,
    };
    let id = service.register_endpoint(endpoint).await;

    info!(webhook_id = %id, "Webhook endpoint created");

    Ok((
        StatusCode::CREATED,
        Json(EndpointCreatedResponse {
            id,
            url: req.url,
            secret,
            events: req.events,
            is_active,
        }),
    ))
}

/// PATCH /api/webhooks/endpoints/{id}
#[instrument(skip(service, req))]
pub async fn update_endpoint(
    State(service): State<WebhookService>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEndpointRequest>,
) -> ApiResult<Json<WebhookEndpointResponse>> {
    if let Some(ref url) = req.url {
        validate_url(url)?;
    }
    if let Some(ref events) = req.events {
        validate_events(events)?;
    }
    if req.secret.as_deref() == Some("") {
        return Err(WebhookError::Validation("Secret must not be empty".to_string()).into());
    }

    let update = EndpointUpdate {
        url: req.url,
        secret: req.secret,
        events: req.events,
        is_active: req.is_active,
        ..Default::default()
    };
    if !service.update_endpoint(id, update).await {
        return Err(WebhookError::NotFound.into());
    }

    let endpoint = service
        .get_endpoint(id)
        .await
        .ok_or(WebhookError::NotFound)?;
    info!(webhook_id = %id, "Webhook endpoint updated");
    Ok(Json(endpoint.into()))
}

/// DELETE /api/webhooks/endpoints/{id}
#[instrument(skip(service))]
pub async fn delete_endpoint(
    State(service): State<WebhookService>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if service.unregister_endpoint(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebhookError::NotFound.into())
    }
}

/// POST /api/webhooks/send
#[instrument(skip(service, req), fields(event = %req.event))]
pub async fn send_webhook(
    State(service): State<WebhookService>,
    Json(req): Json<SendWebhookRequest>,
) -> ApiResult<Json<SendResult>> {
    if req.event.trim().is_empty() {
        return Err(WebhookError::Validation("Event name is required".to_string()).into());
    }

    let result = service
        .send_webhook(&req.event, req.data, req.endpoint_ids.as_deref())
        .await;
    Ok(Json(result))
}

/// GET /api/webhooks/deliveries
#[instrument(skip(service))]
pub async fn list_deliveries(
    State(service): State<WebhookService>,
    Query(query): Query<DeliveriesQuery>,
) -> Json<Vec<WebhookDelivery>> {
    let limit = query.limit.unwrap_or(DEFAULT_DELIVERY_LIMIT);
    Json(service.get_deliveries(limit).await)
}

/// GET /api/webhooks/stats
#[instrument(skip(service))]
pub async fn stats(State(service): State<WebhookService>) -> Json<WebhookStats> {
    Json(service.get_stats().await)
}

/// POST /api/webhooks/cleanup
#[instrument(skip(service))]
pub async fn cleanup(
    State(service): State<WebhookService>,
    Query(query): Query<CleanupQuery>,
) -> Json<CleanupResponse> {
    let days = query.days.unwrap_or(service.config().retention_days);
    let removed = service.cleanup_old_deliveries(days).await;
    Json(CleanupResponse { removed })
}

/// POST /api/webhooks/verify
#[instrument(skip_all)]
pub async fn verify_signature(
    Json(req): Json<VerifySignatureRequest>,
) -> Json<VerifySignatureResponse> {
    Json(VerifySignatureResponse {
        valid: WebhookService::verify_signature(&req.payload, &req.signature, &req.secret),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.com/hook").is_ok());
        assert!(validate_url("http://localhost:3000/hook").is_ok());
        assert!(validate_url("ftp://example.com/hook").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url(&format!("https://{}", "a".repeat(2050))).is_err());
    }

    #[test]
    fn event_validation() {
        let ok = vec!["project.created".to_string()];
        let blank = vec![" ".to_string()];
        let none: Vec<String> = Vec::new();
        assert!(validate_events(&ok).is_ok());
        assert!(validate_events(&blank).is_err());
        assert!(validate_events(&none).is_err());
    }
}
