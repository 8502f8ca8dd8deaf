use crate::{
    entities::order::{self, Entity as OrderEntity, PaymentStatus},
    entities::payment_transaction::{
        self, Entity as TransactionEntity, TransactionStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{PaymentGateway, RemoteOrder},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub remote_order: RemoteOrder,
    pub transaction_id: Uuid,
}

/// Initiates gateway payments: creates the remote intent, records the
/// ledger row, and stamps the order with its remote reference.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    /// Creates (or returns the already recorded) remote payment intent for
    /// an order.
    ///
    /// The receipt sent to the gateway is the order id, and an existing
    /// `created` ledger row short-circuits the call, so client retries
    /// cannot mint duplicate intents. A gateway failure leaves the order
    /// untouched (`pending/pending`) and the call safely retryable.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn initiate_payment(
        &self,
        order_id: Uuid,
    ) -> Result<InitiatePaymentResponse, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(ServiceError::InvalidOperation(
                "order is already paid".to_string(),
            ));
        }

        if let Some(existing) = TransactionEntity::find()
            .filter(payment_transaction::Column::OrderId.eq(order_id))
            .filter(payment_transaction::Column::Status.eq(TransactionStatus::Created))
            .one(&*self.db)
            .await?
        {
            info!(
                order_id = %order_id,
                remote_order_id = %existing.remote_order_id,
                "Reusing pending remote order for retried payment creation"
            );
            return Ok(InitiatePaymentResponse {
                remote_order: RemoteOrder {
                    remote_order_id: existing.remote_order_id.clone(),
                    amount_minor: existing.amount_minor,
                    currency: existing.currency.clone(),
                    status: "created".to_string(),
                },
                transaction_id: existing.id,
            });
        }

        let receipt = order.id.to_string();
        let notes = serde_json::json!({ "user_id": order.user_id });
        let remote = self
            .gateway
            .create_remote_order(order.total_amount, &receipt, notes)
            .await?;

        let txn = self.db.begin().await?;

        let transaction_id = Uuid::new_v4();
        let now = Utc::now();
        payment_transaction::ActiveModel {
            id: Set(transaction_id),
            order_id: Set(Some(order.id)),
            remote_order_id: Set(remote.remote_order_id.clone()),
            remote_payment_id: Set(None),
            signature: Set(None),
            amount_minor: Set(remote.amount_minor),
            currency: Set(remote.currency.clone()),
            status: Set(TransactionStatus::Created),
            raw_payload: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let version = order.version;
        let mut order_update: order::ActiveModel = order.into();
        order_update.gateway_order_id = Set(Some(remote.remote_order_id.clone()));
        order_update.version = Set(version + 1);
        order_update.updated_at = Set(Some(now));
        order_update.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id = %order_id,
            remote_order_id = %remote.remote_order_id,
            amount_minor = remote.amount_minor,
            "Payment initiated"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PaymentInitiated {
                    order_id,
                    remote_order_id: remote.remote_order_id.clone(),
                })
                .await
            {
                warn!(error = %e, "Failed to publish payment initiated event");
            }
        }

        Ok(InitiatePaymentResponse {
            remote_order: remote,
            transaction_id,
        })
    }
}
