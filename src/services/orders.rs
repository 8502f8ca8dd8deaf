use crate::{
    entities::order::{
        self, ActiveModel as OrderActiveModel, DeliveryStatus, Entity as OrderEntity,
        Model as OrderModel, PaymentMethod, PaymentStatus,
    },
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::carts::CartService,
    services::pricing::{self, CartLine, PurchaseMode},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Shipping address snapshot captured on the order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address_line: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CartLine>,
    #[validate]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default = "default_purchase_mode")]
    pub purchase_mode: PurchaseMode,
}

fn default_purchase_mode() -> PurchaseMode {
    PurchaseMode::Customer
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    #[schema(value_type = Object)]
    pub shipping_address: serde_json::Value,
    pub items: Vec<OrderItemResponse>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub invoice_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rejects cancellation unless the order is still awaiting fulfilment.
fn ensure_cancellable(current: DeliveryStatus) -> Result<(), ServiceError> {
    if current != DeliveryStatus::Pending {
        return Err(ServiceError::InvalidOperation(format!(
            "order cannot be cancelled once {}",
            current.to_value()
        )));
    }
    Ok(())
}

/// Admin fulfilment transitions: pending -> shipped -> delivered.
fn ensure_delivery_transition(
    current: DeliveryStatus,
    next: DeliveryStatus,
) -> Result<(), ServiceError> {
    let allowed = matches!(
        (current, next),
        (DeliveryStatus::Pending, DeliveryStatus::Shipped)
            | (DeliveryStatus::Shipped, DeliveryStatus::Delivered)
    );

    if !allowed {
        return Err(ServiceError::InvalidOperation(format!(
            "delivery status cannot move from {} to {}",
            current.to_value(),
            next.to_value()
        )));
    }
    Ok(())
}

/// Service for checkout orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    carts: Arc<CartService>,
    event_sender: Option<Arc<EventSender>>,
    currency: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carts: Arc<CartService>,
        event_sender: Option<Arc<EventSender>>,
        currency: String,
    ) -> Self {
        Self {
            db,
            carts,
            event_sender,
            currency,
        }
    }

    /// Creates an order for the caller: prices and reserves every line,
    /// then persists the order and its item snapshots in one transaction.
    /// Cash-on-delivery orders clear the cart immediately; gateway orders
    /// keep it until the payment is captured.
    #[instrument(skip(self, request), fields(user_id = %user_id, item_count = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let priced = pricing::price_and_reserve(&txn, &request.items, request.purchase_mode).await?;

        let address_snapshot = serde_json::to_string(&request.shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("address snapshot: {}", e)))?;

        let order_model = OrderActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(priced.total_amount),
            currency: Set(self.currency.clone()),
            payment_method: Set(request.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            delivery_status: Set(DeliveryStatus::Pending),
            shipping_address: Set(address_snapshot),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            amount_minor: Set(None),
            invoice_url: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        for line in &priced.lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = %order_id, total = %priced.total_amount, "Order created");

        if request.payment_method == PaymentMethod::CashOnDelivery {
            self.carts.clear_cart_best_effort(user_id).await;
            self.emit(Event::OrderConfirmed(order_id)).await;
        }
        self.emit(Event::OrderCreated(order_id)).await;

        self.load_response(order_model).await
    }

    /// Fetches an order with ownership enforcement.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.find_order(order_id).await?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another account".to_string(),
            ));
        }

        self.load_response(order).await
    }

    /// Customer-initiated cancellation: owner-only, and only while the
    /// order has not entered fulfilment. Reserved stock is not restored.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another account".to_string(),
            ));
        }

        ensure_cancellable(order.delivery_status)?;

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.delivery_status = Set(DeliveryStatus::Cancelled);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, "Order cancelled");
        self.emit(Event::OrderCancelled(order_id)).await;

        self.load_response(updated).await
    }

    /// Fulfilment transition applied on behalf of the back-office
    /// collaborator; customer cancellation does not pass through here.
    #[instrument(skip(self))]
    pub async fn update_delivery_status(
        &self,
        order_id: Uuid,
        next: DeliveryStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.delivery_status;
        ensure_delivery_transition(old_status, next)?;

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.delivery_status = Set(next);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.emit(Event::DeliveryStatusChanged {
            order_id,
            old_status: old_status.to_value(),
            new_status: next.to_value(),
        })
        .await;

        self.load_response(updated).await
    }

    async fn find_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to publish event");
            }
        }
    }

    async fn load_response(&self, model: OrderModel) -> Result<OrderResponse, ServiceError> {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(model.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(model_to_response(model, &items))
    }
}

fn model_to_response(model: OrderModel, items: &[order_item::Model]) -> OrderResponse {
    let shipping_address = serde_json::from_str(&model.shipping_address)
        .unwrap_or(serde_json::Value::Null);

    OrderResponse {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        currency: model.currency,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        delivery_status: model.delivery_status,
        shipping_address,
        items: items
            .iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        gateway_order_id: model.gateway_order_id,
        gateway_payment_id: model.gateway_payment_id,
        invoice_url: model.invoice_url,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
