pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub payments: Arc<crate::services::payments::PaymentService>,
    pub reconciler: Arc<crate::services::reconciler::ReconcilerService>,
    pub carts: Arc<crate::services::carts::CartService>,
}

impl AppServices {
    /// Wires the service graph from the shared connection pool, event
    /// channel, and the injected gateway adapter.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        let carts = Arc::new(crate::services::carts::CartService::new(db.clone()));

        let orders = Arc::new(crate::services::orders::OrderService::new(
            db.clone(),
            carts.clone(),
            Some(event_sender.clone()),
            currency,
        ));

        let payments = Arc::new(crate::services::payments::PaymentService::new(
            db.clone(),
            gateway,
            Some(event_sender.clone()),
        ));

        let reconciler = Arc::new(crate::services::reconciler::ReconcilerService::new(
            db,
            carts.clone(),
            Some(event_sender),
        ));

        Self {
            orders,
            payments,
            reconciler,
            carts,
        }
    }
}
