use crate::errors::ServiceError;
use tracing::{info, instrument};
use uuid::Uuid;

/// Thin seam in front of the notification collaborator (email/SMS live in
/// a separate service). Callers treat every send as best-effort.
#[derive(Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self))]
    pub async fn send_order_confirmation(&self, order_id: Uuid) -> Result<(), ServiceError> {
        info!(order_id = %order_id, "Order confirmation queued for delivery");
        Ok(())
    }
}
