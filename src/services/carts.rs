use crate::entities::{cart, cart_item};
use crate::errors::ServiceError;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Narrow interface onto the cart collaborator. Checkout only ever empties
/// a user's cart; browsing and mutation belong to the storefront service.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Removes every item from the user's cart. Returns the number of
    /// removed lines; a missing cart is not an error.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(0);
        };

        let deleted = cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        info!(user_id = %user_id, removed = deleted.rows_affected, "Cart cleared");
        Ok(deleted.rows_affected)
    }

    /// Best-effort wrapper used after a completed checkout or captured
    /// payment: failures are logged, never surfaced, never rolled back.
    pub async fn clear_cart_best_effort(&self, user_id: Uuid) {
        if let Err(e) = self.clear_cart(user_id).await {
            warn!(user_id = %user_id, error = %e, "Cart clear failed after order completion");
        }
    }
}
