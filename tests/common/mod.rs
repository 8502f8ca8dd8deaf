// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, Response},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use storefront_api::{
    app_router,
    auth::USER_ID_HEADER,
    config::AppConfig,
    db,
    entities::{cart, cart_item, order, payment_transaction, product},
    events::{self, EventSender},
    gateway::{mock::MockGateway, signature},
    handlers::payment_webhooks::SIGNATURE_HEADER,
    handlers::AppServices,
    services::notifications::NotificationService,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test harness: application state over an in-memory SQLite database and a
/// deterministic mock gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
            "key_test_id".to_string(),
            "test_key_secret_0123456789abcdef".to_string(),
            "test_webhook_secret_0123456789ab".to_string(),
        );
        // A single connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::bootstrap_schema(&pool)
            .await
            .expect("failed to bootstrap schema");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            Arc::new(NotificationService::new()),
        ));

        let gateway = Arc::new(MockGateway::new());
        let services = AppServices::new(
            db.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone(),
            cfg.currency.clone(),
        );

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };
        let router = app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header(USER_ID_HEADER, user_id.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request dispatch")
    }

    /// Posts raw webhook bytes with the given signature header value.
    pub async fn post_webhook(&self, body: &[u8], signature_header: &str) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature_header)
            .body(Body::from(body.to_vec()))
            .expect("webhook request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("webhook dispatch")
    }

    pub fn sign_webhook(&self, body: &[u8]) -> String {
        signature::hmac_sha256_hex(body, &self.state.config.gateway_webhook_secret)
    }

    pub fn sign_verify(&self, remote_order_id: &str, remote_payment_id: &str) -> String {
        signature::hmac_sha256_hex(
            signature::verify_digest_input(remote_order_id, remote_payment_id).as_bytes(),
            &self.state.config.gateway_key_secret,
        )
    }

    pub async fn seed_product(
        &self,
        name: &str,
        sku: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        self.seed_product_full(name, sku, price, None, None, 1, stock)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn seed_product_full(
        &self,
        name: &str,
        sku: &str,
        price: Decimal,
        retailer_price: Option<Decimal>,
        bulk_price: Option<Decimal>,
        min_bulk_qty: i32,
        stock: i32,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(sku.to_string()),
            price: Set(price),
            retailer_price: Set(retailer_price),
            bulk_price: Set(bulk_price),
            min_bulk_qty: Set(min_bulk_qty),
            stock: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) {
        let cart_id = Uuid::new_v4();
        cart::ActiveModel {
            id: Set(cart_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart");

        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart item");
    }

    pub async fn cart_item_count(&self, user_id: Uuid) -> u64 {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.state.db)
            .await
            .expect("cart lookup")
        else {
            return 0;
        };

        cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.state.db)
            .await
            .expect("cart item lookup")
            .len() as u64
    }

    pub async fn find_order(&self, order_id: Uuid) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.state.db)
            .await
            .expect("order lookup")
            .expect("order exists")
    }

    pub async fn transactions_for(&self, remote_order_id: &str) -> Vec<payment_transaction::Model> {
        payment_transaction::Entity::find()
            .filter(payment_transaction::Column::RemoteOrderId.eq(remote_order_id))
            .all(&*self.state.db)
            .await
            .expect("transaction lookup")
    }

    pub async fn product_stock(&self, product_id: Uuid) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("product lookup")
            .expect("product exists")
            .stock
    }

    pub async fn set_product_price(&self, product_id: Uuid, price: Decimal) {
        let item = product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("product lookup")
            .expect("product exists");

        let mut active: product::ActiveModel = item.into();
        active.price = Set(price);
        active.updated_at = Set(Utc::now());
        active.update(&*self.state.db).await.expect("price update");
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Standard shipping address payload used across tests.
pub fn shipping_address() -> Value {
    serde_json::json!({
        "full_name": "Asha Verma",
        "phone": "9000000001",
        "address_line": "14 MG Road",
        "city": "Pune",
        "state": "Maharashtra",
        "postal_code": "411001"
    })
}
