//! Deterministic in-process gateway used by tests.

use super::{to_minor_units, PaymentGateway, RemoteOrder};
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Gateway stand-in that derives the remote order id from the receipt,
/// mirroring receipt-level deduplication on the real processor.
#[derive(Default)]
pub struct MockGateway {
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of create calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next create call fail with a gateway error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn remote_order_id_for(receipt: &str) -> String {
        let digest = Sha256::digest(receipt.as_bytes());
        format!("order_{}", &hex::encode(digest)[..14])
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_remote_order(
        &self,
        amount_major: Decimal,
        receipt: &str,
        _notes: serde_json::Value,
    ) -> Result<RemoteOrder, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "simulated gateway outage".to_string(),
            ));
        }

        Ok(RemoteOrder {
            remote_order_id: Self::remote_order_id_for(receipt),
            amount_minor: to_minor_units(amount_major)?,
            currency: "INR".to_string(),
            status: "created".to_string(),
        })
    }
}
