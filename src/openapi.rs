use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Checkout and payment reconciliation backend"
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_delivery_status,
        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::order::PaymentMethod,
        crate::entities::order::PaymentStatus,
        crate::entities::order::DeliveryStatus,
        crate::entities::payment_transaction::TransactionStatus,
        crate::gateway::RemoteOrder,
        crate::services::pricing::CartLine,
        crate::services::pricing::PurchaseMode,
        crate::services::orders::ShippingAddress,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::OrderItemResponse,
        crate::services::orders::OrderResponse,
        crate::handlers::orders::UpdateDeliveryStatusRequest,
        crate::handlers::payments::CreatePaymentOrderRequest,
        crate::handlers::payments::CreatePaymentOrderResponse,
        crate::handlers::payments::VerifyPaymentRequest,
    )),
    tags(
        (name = "Orders", description = "Checkout orders"),
        (name = "Payments", description = "Gateway payments and reconciliation"),
        (name = "Health", description = "Service probes")
    )
)]
pub struct ApiDoc;
