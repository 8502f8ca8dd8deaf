use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::gateway::{signature, RemoteOrder};
use crate::handlers::AppState;
use crate::ApiResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentOrderResponse {
    pub remote_order: RemoteOrder,
    pub transaction_id: Uuid,
    /// Public gateway key the frontend hands to the checkout widget
    pub client_key: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub remote_order_id: String,
    pub remote_payment_id: String,
    pub signature: String,
}

/// Create a remote payment intent for an order
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 201, description = "Remote order created", body = crate::ApiResponse<CreatePaymentOrderResponse>),
        (status = 400, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway failure; order left pending and retryable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatePaymentOrderResponse>>), ServiceError> {
    let initiated = state
        .services
        .payments
        .initiate_payment(request.order_id)
        .await?;

    let response = CreatePaymentOrderResponse {
        remote_order: initiated.remote_order,
        transaction_id: initiated.transaction_id,
        client_key: state.config.gateway_key_id.clone(),
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Client-side payment confirmation (optimistic path)
///
/// Verifies the checkout widget's signature over
/// `remote_order_id|remote_payment_id` and funnels into the same
/// reconciliation routine as the webhook; the two paths may arrive in any
/// order or concurrently and converge on the same state.
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and reconciled"),
        (status = 400, description = "Signature mismatch; no state was changed", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let digest_input =
        signature::verify_digest_input(&request.remote_order_id, &request.remote_payment_id);

    if !signature::verify_hmac_sha256(
        digest_input.as_bytes(),
        &state.config.gateway_key_secret,
        &request.signature,
    ) {
        warn!(
            remote_order_id = %request.remote_order_id,
            "Payment verification rejected: signature mismatch"
        );
        return Err(ServiceError::SignatureMismatch);
    }

    state
        .services
        .reconciler
        .mark_captured(
            &request.remote_order_id,
            &request.remote_payment_id,
            Some(&request.signature),
            None,
            None,
        )
        .await?;

    Ok(Json(json!({ "ok": true })))
}
