use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::gateway::signature;
use crate::handlers::AppState;

/// Header carrying the gateway's HMAC over the raw request body.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    payment: Option<WebhookPayment>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayment {
    #[serde(default)]
    entity: Option<PaymentEntity>,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
    #[serde(default)]
    amount: Option<i64>,
}

/// Gateway webhook (authoritative confirmation path)
///
/// The signature is computed over the exact bytes received, before any
/// parsing; a mismatch mutates nothing. Unknown events are acked so new
/// gateway event types never cause retry storms, and business-level
/// misses (no matching order) are acked too — only infrastructure
/// failures surface as 5xx, which the gateway retries.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid signature or body", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook rejected: missing signature header");
            ServiceError::SignatureMismatch
        })?;

    if !signature::verify_hmac_sha256(&body, &state.config.gateway_webhook_secret, provided) {
        warn!("Webhook rejected: signature mismatch");
        return Err(ServiceError::SignatureMismatch);
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;
    let raw_payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;

    match envelope.event.as_str() {
        "payment.captured" => {
            let Some(entity) = extract_entity(envelope.payload) else {
                warn!("payment.captured without a payment entity; acknowledged");
                return Ok(Json(json!({ "ok": true })));
            };

            state
                .services
                .reconciler
                .mark_captured(
                    &entity.order_id,
                    &entity.id,
                    Some(provided),
                    entity.amount,
                    Some(raw_payload),
                )
                .await?;
        }
        "payment.failed" => {
            let Some(entity) = extract_entity(envelope.payload) else {
                warn!("payment.failed without a payment entity; acknowledged");
                return Ok(Json(json!({ "ok": true })));
            };

            state
                .services
                .reconciler
                .mark_failed(&entity.order_id, Some(raw_payload))
                .await?;
        }
        other => {
            info!(event = %other, "Unhandled gateway webhook event");
        }
    }

    Ok(Json(json!({ "ok": true })))
}

fn extract_entity(payload: Option<WebhookPayload>) -> Option<PaymentEntity> {
    payload?.payment?.entity
}
