//! Payment reconciliation integration tests: the webhook and the
//! synchronous verify call must converge idempotently on one transaction
//! row and one terminal order state, whatever the arrival order.

mod common;

use axum::http::Method;
use common::{response_json, shipping_address, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::entities::order::{PaymentMethod, PaymentStatus};
use storefront_api::entities::payment_transaction::TransactionStatus;
use uuid::Uuid;

/// Creates a gateway-paid order and initiates the remote payment.
/// Returns (order id, remote order id, amount in minor units).
async fn checkout_with_gateway(app: &TestApp, user: Uuid) -> (Uuid, String, i64) {
    let item = app
        .seed_product("Basmati Rice 5kg", "RICE-5KG", dec!(500), 10)
        .await;
    app.seed_cart(user, item.id, 2).await;

    let payload = json!({
        "items": [{ "product_id": item.id, "quantity": 2 }],
        "shipping_address": shipping_address(),
        "payment_method": "gateway"
    });

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(user), Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let order_id = Uuid::parse_str(body["data"]["id"].as_str().unwrap()).unwrap();

    // Gateway checkout leaves the cart untouched until capture.
    assert_eq!(app.cart_item_count(user).await, 1);

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(user),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let remote = &body["data"]["remote_order"];
    let remote_order_id = remote["remote_order_id"].as_str().unwrap().to_string();
    let amount_minor = remote["amount_minor"].as_i64().unwrap();
    assert_eq!(body["data"]["client_key"], "key_test_id");

    (order_id, remote_order_id, amount_minor)
}

fn captured_payload(remote_order_id: &str, payment_id: &str, amount: i64) -> Vec<u8> {
    json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": remote_order_id,
                    "amount": amount
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn failed_payload(remote_order_id: &str) -> Vec<u8> {
    json!({
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_failed",
                    "order_id": remote_order_id,
                    "amount": null
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn captured_webhook_marks_order_paid_and_clears_cart() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;
    assert_eq!(amount_minor, 100_000);

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["ok"], true);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_method, PaymentMethod::Gateway);
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_123"));
    assert_eq!(order.amount_minor, Some(100_000));

    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Captured);
    assert_eq!(transactions[0].order_id, Some(order_id));

    assert_eq!(app.cart_item_count(user).await, 0);
}

#[tokio::test]
async fn replayed_webhooks_leave_one_transaction_and_a_paid_order() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let signature = app.sign_webhook(&body);

    for _ in 0..3 {
        let response = app.post_webhook(&body, &signature).await;
        assert_eq!(response.status(), 200);

        let order = app.find_order(order_id).await;
        assert_eq!(order.payment_status, PaymentStatus::Paid);

        let transactions = app.transactions_for(&remote_order_id).await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, TransactionStatus::Captured);
    }
}

#[tokio::test]
async fn tampered_webhook_bodies_change_nothing() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let signature = app.sign_webhook(&body);

    let mut tampered = body.clone();
    let idx = tampered.len() / 2;
    tampered[idx] ^= 0x01;

    let response = app.post_webhook(&tampered, &signature).await;
    assert_eq!(response.status(), 400);

    // Zero state mutation: order pending, ledger still `created`, cart full.
    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Created);
    assert_eq!(app.cart_item_count(user).await, 1);
}

#[tokio::test]
async fn webhooks_without_signature_are_rejected() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (_, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let response = app.post_webhook(&body, "not-a-signature").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_webhook_events_are_acknowledged_without_action() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, _, _) = checkout_with_gateway(&app, user).await;

    let body = json!({ "event": "payment.authorized", "payload": {} })
        .to_string()
        .into_bytes();
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn client_verify_reconciles_through_the_same_path() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, _) = checkout_with_gateway(&app, user).await;

    let signature = app.sign_verify(&remote_order_id, "pay_456");
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            None,
            Some(json!({
                "remote_order_id": remote_order_id,
                "remote_payment_id": "pay_456",
                "signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_456"));

    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Captured);
    // The verify body carries no amount; the initiation amount stands.
    assert_eq!(transactions[0].amount_minor, 100_000);
}

#[tokio::test]
async fn verify_with_bad_signature_mutates_nothing() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, _) = checkout_with_gateway(&app, user).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/verify",
            None,
            Some(json!({
                "remote_order_id": remote_order_id,
                "remote_payment_id": "pay_456",
                "signature": "f".repeat(64)
            })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions[0].status, TransactionStatus::Created);
}

#[tokio::test]
async fn concurrent_webhook_and_verify_converge() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_789", amount_minor);
    let webhook_signature = app.sign_webhook(&body);
    let verify_signature = app.sign_verify(&remote_order_id, "pay_789");

    let webhook_call = app.post_webhook(&body, &webhook_signature);
    let verify_call = app.request(
        Method::POST,
        "/api/v1/payments/verify",
        None,
        Some(json!({
            "remote_order_id": remote_order_id,
            "remote_payment_id": "pay_789",
            "signature": verify_signature
        })),
    );

    let (webhook_response, verify_response) = tokio::join!(webhook_call, verify_call);
    assert_eq!(webhook_response.status(), 200);
    assert_eq!(verify_response.status(), 200);

    // Same end state as either path alone.
    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_789"));

    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Captured);
}

#[tokio::test]
async fn failed_webhook_marks_order_failed_until_a_retry_captures() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = failed_payload(&remote_order_id);
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions[0].status, TransactionStatus::Failed);

    // The gateway allows retrying payment against the same remote order.
    let body = captured_payload(&remote_order_id, "pay_retry", amount_minor);
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn stale_failure_never_downgrades_a_paid_order() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let signature = app.sign_webhook(&body);
    app.post_webhook(&body, &signature).await;

    let body = failed_payload(&remote_order_id);
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    let transactions = app.transactions_for(&remote_order_id).await;
    assert_eq!(transactions[0].status, TransactionStatus::Captured);
}

#[tokio::test]
async fn payment_creation_retries_reuse_the_remote_order() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, _) = checkout_with_gateway(&app, user).await;
    assert_eq!(app.gateway.calls(), 1);

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(user),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(
        body["data"]["remote_order"]["remote_order_id"],
        remote_order_id.as_str()
    );

    // The short-circuit answered from the ledger; no second remote intent.
    assert_eq!(app.gateway.calls(), 1);
    assert_eq!(app.transactions_for(&remote_order_id).await.len(), 1);
}

#[tokio::test]
async fn paying_an_already_paid_order_is_rejected() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let (order_id, remote_order_id, amount_minor) = checkout_with_gateway(&app, user).await;

    let body = captured_payload(&remote_order_id, "pay_123", amount_minor);
    let signature = app.sign_webhook(&body);
    app.post_webhook(&body, &signature).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(user),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn gateway_outage_leaves_the_order_pending_and_retryable() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let item = app.seed_product("Ghee 1L", "GHEE-1L", dec!(500), 10).await;

    let payload = json!({
        "items": [{ "product_id": item.id, "quantity": 1 }],
        "shipping_address": shipping_address(),
        "payment_method": "gateway"
    });
    let response = app
        .request(Method::POST, "/api/v1/orders", Some(user), Some(payload))
        .await;
    let body = response_json(response).await;
    let order_id = Uuid::parse_str(body["data"]["id"].as_str().unwrap()).unwrap();

    app.gateway.fail_next();
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(user),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 500);

    let order = app.find_order(order_id).await;
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.gateway_order_id, None);

    // The retry succeeds once the gateway recovers.
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(user),
            Some(json!({ "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn captures_for_unrecorded_remote_orders_are_ledgered_and_acked() {
    let app = TestApp::new().await;

    let body = captured_payload("order_never_seen", "pay_999", 5_000);
    let signature = app.sign_webhook(&body);
    let response = app.post_webhook(&body, &signature).await;
    assert_eq!(response.status(), 200);

    let transactions = app.transactions_for("order_never_seen").await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Captured);
    assert_eq!(transactions[0].order_id, None);
    assert_eq!(transactions[0].amount_minor, 5_000);
}
