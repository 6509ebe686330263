//! Checkout and order lifecycle handlers.
//!
//! ## Checkout
//! ```text
//! POST /api/orders
//!      │
//!      ├── price_order() against the live catalog (snapshots, totals)
//!      ├── OrderRepository::place() (one transaction, conditional decrements)
//!      └── order feed entry (best effort)
//! ```
//!
//! Status and COD payment updates are planned in emporium-core and written
//! with a guard on the status that was read.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use emporium_core::notification::{Notification, NotificationKind};
use emporium_core::order::{
    initial_payment_result, plan_cod_payment_update, plan_status_change, price_order, OrderLine,
};
use emporium_core::validation::{validate_order_size, validate_shipping_address};
use emporium_core::{
    Order, OrderStatus, PageRequest, Paginated, PaymentMethod, PaymentStatus,
    ShippingAddress, RECENT_NOTIFICATIONS,
};
use emporium_db::repository::generate_id;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/my-orders", get(my_orders))
        .route("/admin/recent", get(recent_notifications))
        .route("/admin/clear-notifications", post(clear_notifications))
        .route("/{id}", get(get_order))
        .route("/{id}/status", put(update_status))
        .route("/{id}/payment-status", put(update_payment_status))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

// =============================================================================
// Customer Handlers
// =============================================================================

async fn place_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    validate_order_size(req.items.len())?;
    validate_shipping_address(&req.shipping_address)?;

    let ids: Vec<String> = req.items.iter().map(|line| line.product_id.clone()).collect();
    let products = state.db.products().get_many(&ids).await?;
    let priced = price_order(&req.items, &products)?;

    let now = Utc::now();
    let order = Order {
        id: generate_id(),
        user_id: user.id.clone(),
        items: priced.items,
        shipping_address: req.shipping_address,
        payment_method: req.payment_method,
        subtotal_cents: priced.subtotal.cents(),
        shipping_cents: priced.shipping.cents(),
        tax_cents: priced.tax.cents(),
        total_cents: priced.total.cents(),
        order_status: OrderStatus::Pending,
        payment_result: initial_payment_result(req.payment_method, now),
        tracking_number: None,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    };

    state.db.orders().place(&order).await?;

    state
        .feed(NotificationKind::Orders)
        .notify(
            &order.id,
            format!("New order from {} for {}", user.name, priced.total),
        )
        .await;

    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list_for_user(&user.id).await?))
}

/// Owners see their own orders, admins see any.
async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.db.orders().get(&id).await?;

    if !order.is_owned_by(&user.id) && !user.is_admin() {
        return Err(ApiError::Forbidden("Not authorized to view this order".to_string()));
    }

    Ok(Json(order))
}

// =============================================================================
// Admin Handlers
// =============================================================================

async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> ApiResult<Json<Paginated<Order>>> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(raw.parse::<OrderStatus>()?),
    };

    let page = PageRequest::new(query.page, query.limit);
    Ok(Json(state.db.orders().list(status, page).await?))
}

async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusUpdateRequest>,
) -> ApiResult<Json<Order>> {
    let next: OrderStatus = req.status.parse()?;

    let orders = state.db.orders();
    let order = orders.get(&id).await?;
    let change = plan_status_change(&order, next, req.tracking_number.as_deref(), Utc::now())?;

    let updated = orders.update_status(&id, &change).await?;
    info!(
        order_id = %id,
        admin_id = %admin.id,
        from = %change.from,
        to = %change.to,
        "Order status updated"
    );
    Ok(Json(updated))
}

async fn update_payment_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PaymentStatusRequest>,
) -> ApiResult<Json<Order>> {
    let orders = state.db.orders();
    let order = orders.get(&id).await?;
    let payment = plan_cod_payment_update(&order, req.payment_status, Utc::now())?;

    let updated = orders.update_payment_result(&id, &payment).await?;
    info!(
        order_id = %id,
        admin_id = %admin.id,
        payment_status = ?req.payment_status,
        "COD payment status updated"
    );
    Ok(Json(updated))
}

async fn recent_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let recent = state
        .feed(NotificationKind::Orders)
        .recent(RECENT_NOTIFICATIONS)
        .await?;
    Ok(Json(recent))
}

async fn clear_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Value>> {
    state.feed(NotificationKind::Orders).mark_all_read().await?;
    Ok(Json(json!({ "message": "Order notifications cleared" })))
}
