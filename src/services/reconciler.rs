use crate::{
    entities::order::{self, Entity as OrderEntity, PaymentMethod, PaymentStatus},
    entities::payment_transaction::{self, Entity as TransactionEntity, TransactionStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::carts::CartService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// The single routine both confirmation paths converge on.
///
/// The gateway delivers webhooks at least once, and the client's
/// synchronous verify call may race with, precede, or follow them for the
/// same payment. Everything here is therefore keyed on `remote_order_id`
/// (unique in the ledger) and written as an upsert: replaying any input
/// leaves exactly one transaction row and the same terminal order state.
#[derive(Clone)]
pub struct ReconcilerService {
    db: Arc<DatabaseConnection>,
    carts: Arc<CartService>,
    event_sender: Option<Arc<EventSender>>,
}

/// True when this capture moves the order to paid for the first time;
/// replays of an already applied capture must not repeat side effects.
fn is_fresh_capture(current: &order::Model, remote_payment_id: &str) -> bool {
    !(current.payment_status == PaymentStatus::Paid
        && current.gateway_payment_id.as_deref() == Some(remote_payment_id))
}

impl ReconcilerService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        carts: Arc<CartService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            carts,
            event_sender,
        }
    }

    /// Applies a confirmed capture to the ledger and the owning order.
    ///
    /// `amount_minor` is present on the webhook path and absent on the
    /// synchronous verify path, which keeps the amount recorded at
    /// initiation. A missing order is tolerated: the ledger row is still
    /// upserted so the capture is never lost, and the caller acks.
    #[instrument(skip(self, signature, raw_payload), fields(remote_order_id = %remote_order_id))]
    pub async fn mark_captured(
        &self,
        remote_order_id: &str,
        remote_payment_id: &str,
        signature: Option<&str>,
        amount_minor: Option<i64>,
        raw_payload: Option<serde_json::Value>,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let existing = TransactionEntity::find()
            .filter(payment_transaction::Column::RemoteOrderId.eq(remote_order_id))
            .one(&txn)
            .await?;

        let order = self
            .resolve_order(&txn, remote_order_id, existing.as_ref())
            .await?;

        match existing {
            Some(row) => {
                let resolved_order_id = row.order_id.or(order.as_ref().map(|o| o.id));
                let mut active: payment_transaction::ActiveModel = row.into();
                active.order_id = Set(resolved_order_id);
                active.remote_payment_id = Set(Some(remote_payment_id.to_string()));
                if let Some(sig) = signature {
                    active.signature = Set(Some(sig.to_string()));
                }
                if let Some(amount) = amount_minor {
                    active.amount_minor = Set(amount);
                }
                if let Some(payload) = raw_payload.clone() {
                    active.raw_payload = Set(Some(payload));
                }
                active.status = Set(TransactionStatus::Captured);
                active.updated_at = Set(Some(now));
                active.update(&txn).await?;
            }
            None => {
                // Fallback: a capture for an intent this service never
                // recorded. The linkage comes from our own order record or
                // stays empty; payload fields are not trusted as local ids.
                warn!(
                    remote_order_id = %remote_order_id,
                    linked = order.is_some(),
                    "Capture received for unrecorded remote order; creating ledger row"
                );
                payment_transaction::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order.as_ref().map(|o| o.id)),
                    remote_order_id: Set(remote_order_id.to_string()),
                    remote_payment_id: Set(Some(remote_payment_id.to_string())),
                    signature: Set(signature.map(str::to_string)),
                    amount_minor: Set(amount_minor.unwrap_or_default()),
                    currency: Set(order
                        .as_ref()
                        .map(|o| o.currency.clone())
                        .unwrap_or_default()),
                    status: Set(TransactionStatus::Captured),
                    raw_payload: Set(raw_payload.clone()),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                }
                .insert(&txn)
                .await?;
            }
        }

        // (order_id, user_id) when this call moved the order to paid;
        // replays skip the write entirely so the row is untouched.
        let mut captured: Option<(Uuid, Uuid)> = None;

        if let Some(order_model) = order {
            if is_fresh_capture(&order_model, remote_payment_id) {
                captured = Some((order_model.id, order_model.user_id));
                let order_id = order_model.id;

                let version = order_model.version;
                let mut active: order::ActiveModel = order_model.into();
                active.payment_status = Set(PaymentStatus::Paid);
                active.payment_method = Set(PaymentMethod::Gateway);
                active.gateway_payment_id = Set(Some(remote_payment_id.to_string()));
                if let Some(sig) = signature {
                    active.gateway_signature = Set(Some(sig.to_string()));
                }
                if let Some(amount) = amount_minor {
                    active.amount_minor = Set(Some(amount));
                }
                active.version = Set(version + 1);
                active.updated_at = Set(Some(now));
                active.update(&txn).await?;

                info!(order_id = %order_id, remote_payment_id = %remote_payment_id, "Order marked paid");
            } else {
                info!(order_id = %order_model.id, "Capture replay; order already paid");
            }
        } else {
            warn!(remote_order_id = %remote_order_id, "No order matches captured payment");
        }

        txn.commit().await?;

        // Side effects run after commit, once per capture, and never undo
        // the payment on failure.
        if let Some((order_id, user_id)) = captured {
            self.carts.clear_cart_best_effort(user_id).await;
            self.emit_capture_events(remote_order_id, order_id).await;
        }

        Ok(())
    }

    /// Applies a failed payment outcome. A failure arriving after the
    /// order is paid is stale (captures are terminal) and is ignored.
    #[instrument(skip(self, raw_payload), fields(remote_order_id = %remote_order_id))]
    pub async fn mark_failed(
        &self,
        remote_order_id: &str,
        raw_payload: Option<serde_json::Value>,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let existing = TransactionEntity::find()
            .filter(payment_transaction::Column::RemoteOrderId.eq(remote_order_id))
            .one(&txn)
            .await?;

        if let Some(row) = &existing {
            if row.status == TransactionStatus::Captured {
                warn!(
                    remote_order_id = %remote_order_id,
                    "Stale failure event ignored; payment already captured"
                );
                return Ok(());
            }
        }

        let order = self
            .resolve_order(&txn, remote_order_id, existing.as_ref())
            .await?;

        match existing {
            Some(row) => {
                let resolved_order_id = row.order_id.or(order.as_ref().map(|o| o.id));
                let mut active: payment_transaction::ActiveModel = row.into();
                active.order_id = Set(resolved_order_id);
                active.status = Set(TransactionStatus::Failed);
                if let Some(payload) = raw_payload.clone() {
                    active.raw_payload = Set(Some(payload));
                }
                active.updated_at = Set(Some(now));
                active.update(&txn).await?;
            }
            None => {
                warn!(
                    remote_order_id = %remote_order_id,
                    linked = order.is_some(),
                    "Failure received for unrecorded remote order; creating ledger row"
                );
                payment_transaction::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order.as_ref().map(|o| o.id)),
                    remote_order_id: Set(remote_order_id.to_string()),
                    remote_payment_id: Set(None),
                    signature: Set(None),
                    amount_minor: Set(0),
                    currency: Set(order
                        .as_ref()
                        .map(|o| o.currency.clone())
                        .unwrap_or_default()),
                    status: Set(TransactionStatus::Failed),
                    raw_payload: Set(raw_payload.clone()),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                }
                .insert(&txn)
                .await?;
            }
        }

        if let Some(order_model) = order {
            if order_model.payment_status == PaymentStatus::Paid {
                warn!(
                    order_id = %order_model.id,
                    "Stale failure event ignored; order already paid"
                );
            } else {
                let order_id = order_model.id;
                let version = order_model.version;
                let mut active: order::ActiveModel = order_model.into();
                active.payment_status = Set(PaymentStatus::Failed);
                active.version = Set(version + 1);
                active.updated_at = Set(Some(now));
                active.update(&txn).await?;

                info!(order_id = %order_id, "Order marked failed");
            }
        }

        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PaymentFailed {
                    remote_order_id: remote_order_id.to_string(),
                })
                .await
            {
                warn!(error = %e, "Failed to publish payment failed event");
            }
        }

        Ok(())
    }

    /// Locates the order for a remote intent: by the order's own gateway
    /// reference first, then through the ledger row's linkage.
    async fn resolve_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        remote_order_id: &str,
        transaction: Option<&payment_transaction::Model>,
    ) -> Result<Option<order::Model>, ServiceError> {
        if let Some(found) = OrderEntity::find()
            .filter(order::Column::GatewayOrderId.eq(remote_order_id))
            .one(conn)
            .await?
        {
            return Ok(Some(found));
        }

        if let Some(order_id) = transaction.and_then(|t| t.order_id) {
            return Ok(OrderEntity::find_by_id(order_id).one(conn).await?);
        }

        Ok(None)
    }

    async fn emit_capture_events(&self, remote_order_id: &str, order_id: Uuid) {
        let Some(sender) = &self.event_sender else {
            return;
        };

        if let Err(e) = sender
            .send(Event::PaymentCaptured {
                order_id,
                remote_order_id: remote_order_id.to_string(),
            })
            .await
        {
            warn!(error = %e, "Failed to publish payment captured event");
        }
        if let Err(e) = sender.send(Event::OrderConfirmed(order_id)).await {
            warn!(error = %e, "Failed to publish order confirmed event");
        }
    }
}
