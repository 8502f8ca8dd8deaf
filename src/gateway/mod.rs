use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

pub mod mock;
pub mod signature;

/// Remote payment intent as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoteOrder {
    pub remote_order_id: String,
    /// Minor currency units (the gateway never deals in majors)
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}

/// Connection settings for the payment gateway, built from [`AppConfig`]
/// at the composition root and injected wherever a gateway is needed.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.gateway_base_url.clone(),
            key_id: cfg.gateway_key_id.clone(),
            key_secret: cfg.gateway_key_secret.clone(),
            currency: cfg.currency.clone(),
            timeout: Duration::from_secs(cfg.gateway_timeout_secs),
        }
    }
}

/// Adapter over the external payment processor. The only place in the
/// system where major units are converted to the gateway's minor units.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates a remote payment intent for `amount_major`. `receipt` is the
    /// internal order id, so retried calls for the same order land on the
    /// gateway's receipt deduplication instead of minting new intents.
    async fn create_remote_order(
        &self,
        amount_major: Decimal,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<RemoteOrder, ServiceError>;
}

/// Converts a major-unit amount to integer minor units (x100, rounded).
pub fn to_minor_units(amount_major: Decimal) -> Result<i64, ServiceError> {
    if amount_major.is_sign_negative() {
        return Err(ServiceError::ValidationError(
            "amount must not be negative".to_string(),
        ));
    }

    (amount_major * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError("amount out of range".to_string()))
}

/// HTTP client for the gateway's REST API.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: serde_json::Value,
}

#[derive(Deserialize)]
struct CreateOrderReply {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::GatewayError(format!("client construction: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self, notes), fields(receipt = %receipt))]
    async fn create_remote_order(
        &self,
        amount_major: Decimal,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<RemoteOrder, ServiceError> {
        let amount = to_minor_units(amount_major)?;
        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));

        let body = CreateOrderBody {
            amount,
            currency: &self.config.currency,
            receipt,
            notes,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gateway request failed");
                ServiceError::GatewayError(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, detail = %detail, "Gateway rejected order creation");
            return Err(ServiceError::GatewayError(format!(
                "remote order creation returned {}",
                status
            )));
        }

        let reply: CreateOrderReply = response.json().await.map_err(|e| {
            error!(error = %e, "Gateway returned malformed order payload");
            ServiceError::GatewayError(format!("malformed response: {}", e))
        })?;

        info!(remote_order_id = %reply.id, amount_minor = reply.amount, "Remote order created");

        Ok(RemoteOrder {
            remote_order_id: reply.id,
            amount_minor: reply.amount,
            currency: reply.currency,
            status: reply.status,
        })
    }
}
