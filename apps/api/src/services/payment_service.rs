//! Payment gateway handlers.
//!
//! ## Flow
//! ```text
//! Storefront                      API                         Gateway
//!     │  POST /create-order        │                              │
//!     │ ─────────────────────────► │  POST /orders (basic auth)   │
//!     │                            │ ───────────────────────────► │
//!     │ ◄───────────────────────── │  {id, amount, currency, key} │
//!     │                                                           │
//!     │  checkout widget ────────────────────────────────────────►│
//!     │  POST /verify-payment {ids, signature}                    │
//!     │ ─────────────────────────► │  HMAC check → confirm order  │
//!     │                            │                              │
//!     │                            │ ◄─── POST /webhook (raw body)│
//!     │                            │  HMAC check → confirm order  │
//! ```
//!
//! create-order records the gateway order id on the order. Both confirmation
//! paths only settle an online order against that recorded id, and both are
//! idempotent: only a pending order advances.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use emporium_core::order::{
    awaiting_gateway_payment, check_gateway_binding, check_gateway_checkout,
    completed_gateway_payment,
};
use emporium_core::signature::{verify_payment, verify_webhook};
use emporium_core::validation::validate_required;
use emporium_core::Order;
use emporium_db::DbError;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";
const PAYMENT_CAPTURED: &str = "payment.captured";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_gateway_order))
        .route("/verify-payment", post(verify_checkout_payment))
        .route("/webhook", post(webhook))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key: String,
}

/// Fields returned by the checkout widget. Accepts both the gateway's
/// snake_case names and camelCase.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default, alias = "razorpayOrderId")]
    pub razorpay_order_id: String,
    #[serde(default, alias = "razorpayPaymentId")]
    pub razorpay_payment_id: String,
    #[serde(default, alias = "razorpaySignature")]
    pub razorpay_signature: String,
    #[serde(default, rename = "orderId")]
    pub order_id: String,
}

async fn create_gateway_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    validate_required("orderId", &req.order_id)?;

    let order = state.db.orders().get(&req.order_id).await?;
    if !order.is_owned_by(&user.id) {
        return Err(ApiError::Forbidden("Not authorized to pay for this order".to_string()));
    }
    check_gateway_checkout(&order)?;

    let gateway_order = state
        .gateway
        .create_order(order.total_cents, &state.config.currency, &order.id, &user.id)
        .await?;

    state
        .db
        .orders()
        .update_payment_result(&order.id, &awaiting_gateway_payment(&gateway_order.id, Utc::now()))
        .await?;

    info!(order_id = %order.id, gateway_order_id = %gateway_order.id, "Gateway order created");

    Ok(Json(CreateOrderResponse {
        id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        key: state.gateway.key_id().to_string(),
    }))
}

async fn verify_checkout_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<VerifyPaymentRequest>,
) -> ApiResult<Json<Value>> {
    validate_required("razorpay_order_id", &req.razorpay_order_id)?;
    validate_required("razorpay_payment_id", &req.razorpay_payment_id)?;
    validate_required("razorpay_signature", &req.razorpay_signature)?;
    validate_required("orderId", &req.order_id)?;

    if state.config.razorpay_key_secret.is_empty() {
        warn!(order_id = %req.order_id, "Payment verification attempted but no key secret is configured");
        return Err(ApiError::InvalidSignature);
    }

    if let Err(err) = verify_payment(
        &state.config.razorpay_key_secret,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    ) {
        warn!(order_id = %req.order_id, user_id = %user.id, "Payment signature mismatch");
        return Err(err.into());
    }

    let orders = state.db.orders();
    let order = orders.get(&req.order_id).await?;
    if !order.is_owned_by(&user.id) {
        return Err(ApiError::Forbidden("Not authorized to pay for this order".to_string()));
    }
    if let Err(err) = check_gateway_binding(&order, &req.razorpay_order_id) {
        warn!(
            order_id = %order.id,
            gateway_order_id = %req.razorpay_order_id,
            "Verified payment does not match the order's gateway order"
        );
        return Err(err.into());
    }

    let payment = completed_gateway_payment(
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        Some(&req.razorpay_signature),
        Utc::now(),
    );
    let order = orders.confirm_payment(&order.id, &payment).await?;
    info!(order_id = %order.id, status = %order.order_status, "Payment verified");

    Ok(Json(json!({
        "message": "Payment verified successfully",
        "order": order,
    })))
}

/// Gateway webhook. The signature covers the exact bytes received, so the
/// body is taken raw and parsed only after verification.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let secret = &state.config.razorpay_webhook_secret;
    if secret.is_empty() {
        warn!("Webhook received but no webhook secret is configured");
        return Err(ApiError::InvalidSignature);
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    if verify_webhook(secret, &body, signature).is_err() {
        warn!("Webhook signature mismatch");
        return Err(ApiError::InvalidSignature);
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation("Malformed webhook payload".to_string()))?;

    match event["event"].as_str() {
        Some(PAYMENT_CAPTURED) => handle_payment_captured(&state, &event).await?,
        other => debug!(event = ?other, "Ignoring webhook event"),
    }

    Ok(Json(json!({ "received": true })))
}

async fn handle_payment_captured(state: &AppState, event: &Value) -> ApiResult<()> {
    let entity = &event["payload"]["payment"]["entity"];

    // notes may arrive as an empty array when the order carried none
    let Some(order_id) = entity["notes"]["orderId"].as_str() else {
        warn!("payment.captured without an order reference");
        return Ok(());
    };
    let payment_id = entity["id"].as_str().unwrap_or_default();
    let gateway_order_id = entity["order_id"].as_str().unwrap_or_default();

    let orders = state.db.orders();
    let order: Order = match orders.get(order_id).await {
        Ok(order) => order,
        Err(DbError::NotFound { .. }) => {
            warn!(order_id = %order_id, "payment.captured for unknown order");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    // Acknowledged either way, the gateway would only redeliver
    if let Err(err) = check_gateway_binding(&order, gateway_order_id) {
        warn!(order_id = %order_id, gateway_order_id = %gateway_order_id, error = %err, "Ignoring payment.captured");
        return Ok(());
    }

    let payment = completed_gateway_payment(gateway_order_id, payment_id, None, Utc::now());
    let order = orders.confirm_payment(&order.id, &payment).await?;

    info!(order_id = %order.id, status = %order.order_status, "Payment captured via webhook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::ApiConfig;
    use crate::email::OutboxMailer;
    use crate::test_support::{
        shipping_address, test_app, test_app_with, TestApp, KEY_SECRET, WEBHOOK_SECRET,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use emporium_core::order::awaiting_gateway_payment;
    use emporium_core::signature::{payment_message, sign};
    use emporium_core::PaymentStatus;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn place(app: &TestApp, token: &str, method: &str) -> String {
        let p = app.product("Speaker", 2500, 5).await;
        let (status, order) = app
            .post(
                "/api/orders",
                Some(token),
                json!({
                    "items": [{ "productId": p.id, "quantity": 1 }],
                    "shippingAddress": shipping_address(),
                    "paymentMethod": method
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        order["id"].as_str().unwrap().to_string()
    }

    async fn online_order(app: &TestApp, token: &str) -> String {
        place(app, token, "razorpay").await
    }

    /// Records `gateway_order` on the order, as create-order does after the
    /// gateway answers.
    async fn bind_gateway_order(app: &TestApp, order_id: &str, gateway_order: &str) {
        app.state
            .db
            .orders()
            .update_payment_result(order_id, &awaiting_gateway_payment(gateway_order, Utc::now()))
            .await
            .unwrap();
    }

    fn checkout_signature(gateway_order: &str, payment: &str) -> String {
        sign(
            KEY_SECRET.as_bytes(),
            payment_message(gateway_order, payment).as_bytes(),
        )
        .unwrap()
    }

    /// Flips the lowest bit of the first hex digit.
    fn flip_one_bit(signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        let digit = chars[0].to_digit(16).unwrap() ^ 1;
        chars[0] = std::char::from_digit(digit, 16).unwrap();
        chars.into_iter().collect()
    }

    async fn verify(
        app: &TestApp,
        token: &str,
        order_id: &str,
        gateway_order: &str,
        payment: &str,
        signature: &str,
    ) -> (StatusCode, Value) {
        app.post(
            "/api/payments/verify-payment",
            Some(token),
            json!({
                "razorpay_order_id": gateway_order,
                "razorpay_payment_id": payment,
                "razorpay_signature": signature,
                "orderId": order_id
            }),
        )
        .await
    }

    async fn post_webhook(app: &TestApp, body: &str, signature: Option<&str>) -> StatusCode {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/payments/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-razorpay-signature", signature);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        app.router.clone().oneshot(request).await.unwrap().status()
    }

    fn captured_event(order_id: &str, gateway_order: &str) -> String {
        json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_9",
                "order_id": gateway_order,
                "notes": { "orderId": order_id }
            }}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_verify_payment_confirms_order() {
        let app = test_app().await;
        let (_, token) = app.customer("payer@example.com").await;
        let order_id = online_order(&app, &token).await;
        bind_gateway_order(&app, &order_id, "order_GW1").await;

        let signature = checkout_signature("order_GW1", "pay_1");
        let (status, body) = verify(&app, &token, &order_id, "order_GW1", "pay_1", &signature).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["orderStatus"], "confirmed");
        assert_eq!(body["order"]["paymentResult"]["paymentStatus"], "completed");
        assert_eq!(body["order"]["paymentResult"]["gatewayOrderId"], "order_GW1");
        assert_eq!(body["order"]["paymentResult"]["gatewayPaymentId"], "pay_1");

        // Already paid, so no second gateway order
        let (status, _) = app
            .post("/api/payments/create-order", Some(&token), json!({ "orderId": order_id }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_flipped_signature_rejected() {
        let app = test_app().await;
        let (_, token) = app.customer("payer@example.com").await;
        let order_id = online_order(&app, &token).await;
        bind_gateway_order(&app, &order_id, "order_GW1").await;
        let signature = flip_one_bit(&checkout_signature("order_GW1", "pay_1"));

        let (status, body) = app
            .post(
                "/api/payments/verify-payment",
                Some(&token),
                json!({
                    "razorpayOrderId": "order_GW1",
                    "razorpayPaymentId": "pay_1",
                    "razorpaySignature": signature,
                    "orderId": order_id
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["message"].as_str().unwrap().contains(&signature));

        let order = app.state.db.orders().get(&order_id).await.unwrap();
        assert_eq!(order.order_status.as_str(), "pending");
        assert_eq!(order.payment_result.unwrap().payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_verification_refused_without_key_secret() {
        let config = ApiConfig {
            jwt_secret: "router-test-secret".to_string(),
            ..Default::default()
        };
        assert!(config.razorpay_key_secret.is_empty());
        let app = test_app_with(OutboxMailer::new(), config).await;
        let (_, token) = app.customer("payer@example.com").await;
        let order_id = online_order(&app, &token).await;
        bind_gateway_order(&app, &order_id, "order_X").await;

        // hex(HMAC-SHA256(key = "", "order_X|pay_X"))
        let forged = "1b1d5c16079e62df4ca3373f713ee0e92b204eca5753f8ee162b01da2ee1bcca";
        let (status, _) = verify(&app, &token, &order_id, "order_X", "pay_X", forged).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let order = app.state.db.orders().get(&order_id).await.unwrap();
        assert_eq!(order.order_status.as_str(), "pending");
    }

    #[tokio::test]
    async fn test_signature_for_other_gateway_order_rejected() {
        let app = test_app().await;
        let (_, token) = app.customer("payer@example.com").await;

        // A genuine signature, but for a different (cheaper) gateway order
        let signature = checkout_signature("order_CHEAP", "pay_CHEAP");

        let online = online_order(&app, &token).await;
        bind_gateway_order(&app, &online, "order_GW1").await;
        let (status, _) = verify(&app, &token, &online, "order_CHEAP", "pay_CHEAP", &signature).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let order = app.state.db.orders().get(&online).await.unwrap();
        assert_eq!(order.order_status.as_str(), "pending");
        assert_eq!(order.payment_result.unwrap().payment_status, PaymentStatus::Pending);

        // Never handed to the gateway at all
        let unbound = online_order(&app, &token).await;
        let (status, _) = verify(&app, &token, &unbound, "order_CHEAP", "pay_CHEAP", &signature).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Cash on delivery settles through the admin endpoint only
        let cod = place(&app, &token, "cod").await;
        let (status, _) = verify(&app, &token, &cod, "order_CHEAP", "pay_CHEAP", &signature).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let order = app.state.db.orders().get(&cod).await.unwrap();
        assert_eq!(order.order_status.as_str(), "pending");
        assert_eq!(order.payment_result.unwrap().payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_order_checks_ownership_and_method() {
        let app = test_app().await;
        let (_, owner) = app.customer("owner@example.com").await;
        let (_, other) = app.customer("other@example.com").await;
        let order_id = online_order(&app, &owner).await;

        let (status, _) = app
            .post("/api/payments/create-order", Some(&other), json!({ "orderId": order_id }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cod = place(&app, &owner, "cod").await;
        let (status, _) = app
            .post("/api/payments/create-order", Some(&owner), json!({ "orderId": cod }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_confirms_order_once() {
        let app = test_app().await;
        let (_, token) = app.customer("payer@example.com").await;
        let order_id = online_order(&app, &token).await;
        bind_gateway_order(&app, &order_id, "order_GW9").await;

        let body = captured_event(&order_id, "order_GW9");
        let signature = sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();

        assert_eq!(post_webhook(&app, &body, None).await, StatusCode::BAD_REQUEST);
        assert_eq!(
            post_webhook(&app, &body, Some(&flip_one_bit(&signature))).await,
            StatusCode::BAD_REQUEST
        );

        assert_eq!(post_webhook(&app, &body, Some(&signature)).await, StatusCode::OK);
        assert_eq!(post_webhook(&app, &body, Some(&signature)).await, StatusCode::OK);

        let order = app.state.db.orders().get(&order_id).await.unwrap();
        assert_eq!(order.order_status.as_str(), "confirmed");
    }

    #[tokio::test]
    async fn test_webhook_ignores_unbound_capture() {
        let app = test_app().await;
        let (_, token) = app.customer("payer@example.com").await;
        let online = online_order(&app, &token).await;
        bind_gateway_order(&app, &online, "order_GW1").await;
        let cod = place(&app, &token, "cod").await;

        for (order_id, gateway_order) in [(&online, "order_CHEAP"), (&cod, "order_GW1")] {
            let body = captured_event(order_id, gateway_order);
            let signature = sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();
            assert_eq!(post_webhook(&app, &body, Some(&signature)).await, StatusCode::OK);

            let order = app.state.db.orders().get(order_id).await.unwrap();
            assert_eq!(order.order_status.as_str(), "pending");
            assert_eq!(order.payment_result.unwrap().payment_status, PaymentStatus::Pending);
        }
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_other_events() {
        let app = test_app().await;
        let body = json!({ "event": "refund.created", "payload": { "payment": { "entity": { "notes": [] } } } })
            .to_string();
        let signature = sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();
        assert_eq!(post_webhook(&app, &body, Some(&signature)).await, StatusCode::OK);

        let captured_without_notes: Value = json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_1", "notes": [] } } }
        });
        let body = captured_without_notes.to_string();
        let signature = sign(WEBHOOK_SECRET.as_bytes(), body.as_bytes()).unwrap();
        assert_eq!(post_webhook(&app, &body, Some(&signature)).await, StatusCode::OK);
    }
}
