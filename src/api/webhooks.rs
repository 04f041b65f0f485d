use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::services::webhook_processor::{WebhookProcessor, WebhookProcessorError};

pub struct WebhookState {
    pub processor: Arc<WebhookProcessor>,
}

/// POST /api/webhooks/ercaspay
///
/// The body is taken raw: the HMAC must be computed over the exact bytes
/// the gateway signed, not a re-serialization.
pub async fn handle_ercaspay_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    info!("ercaspay webhook received");

    let signature = headers
        .get("x-ercaspay-signature")
        .and_then(|v| v.to_str().ok());

    match state
        .processor
        .process_gateway_webhook(body.as_bytes(), signature)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response(),
        Err(WebhookProcessorError::AlreadyProcessed) => {
            // Same response contract as a fresh success, so the gateway's
            // retry logic is satisfied without double effects
            info!("ercaspay webhook already processed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(WebhookProcessorError::InvalidSignature) => {
            warn!("ercaspay webhook rejected: invalid signature");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid signature"})),
            )
                .into_response()
        }
        Err(WebhookProcessorError::InvalidPayload(message)) => {
            warn!(message = %message, "ercaspay webhook rejected: invalid payload");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": message})),
            )
                .into_response()
        }
        Err(WebhookProcessorError::PaymentNotFound(reference)) => {
            // A callback for an unknown payment should not be retried
            warn!(reference = %reference, "ercaspay webhook for unknown payment");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Payment not found"})),
            )
                .into_response()
        }
        Err(WebhookProcessorError::DatabaseError(message)) => {
            error!(error = %message, "ercaspay webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Webhook processing failed"})),
            )
                .into_response()
        }
    }
}

/// POST /api/webhooks/gladtidings
pub async fn handle_gladtidings_webhook(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<JsonValue>,
) -> impl IntoResponse {
    info!("gladtidings webhook received");

    match state.processor.process_vendor_webhook(&payload).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response(),
        Err(e) => {
            error!(error = %e, "gladtidings webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Webhook processing failed"})),
            )
                .into_response()
        }
    }
}
