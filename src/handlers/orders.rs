use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::order::DeliveryStatus;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{CreateOrderRequest, OrderResponse};
use crate::ApiResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeliveryStatusRequest {
    pub delivery_status: DeliveryStatus,
}

/// Create an order from the submitted cart lines
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Validation failure", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state
        .services
        .orders
        .create_order(user.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Get an order by id (owner only)
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = crate::ApiResponse<OrderResponse>),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id, user.user_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel a pending order (owner only)
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Order already in fulfilment", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.cancel_order(id, user.user_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Advance delivery status (back-office collaborator surface)
#[utoipa::path(
    put,
    path = "/api/v1/orders/:id/delivery-status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateDeliveryStatusRequest,
    responses(
        (status = 200, description = "Delivery status updated", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Disallowed transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .update_delivery_status(id, request.delivery_status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
