//! # Order Engine
//!
//! Checkout pricing and the order status state machine.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart lines [{product_id, quantity}]                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  price_order() ← THIS MODULE                                            │
//! │       ├── empty cart?           → ValidationError                       │
//! │       ├── missing / inactive?   → ProductNotFound                       │
//! │       ├── stock < quantity?     → InsufficientStock                     │
//! │       └── OK → PricedOrder (snapshots, subtotal, shipping=0, tax=0)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  emporium-db: one transaction                                           │
//! │       ├── UPDATE products SET stock = stock - qty WHERE stock >= qty    │
//! │       └── INSERT order + items (status = pending)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status State Machine
//! ```text
//!   pending ──► confirmed ──► processing ──► shipped ──► delivered
//!      │            │              │            │
//!      └────────────┴──────────────┴────────────┴──► cancelled
//!
//!   delivered and cancelled are terminal.
//!   Forward skips (pending → shipped) are an admin override and allowed.
//!   shipped requires a tracking number; delivered stamps delivered_at.
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentResult, PaymentStatus, Product};
use crate::validation::{validate_order_size, validate_quantity};

// =============================================================================
// Checkout Pricing
// =============================================================================

/// One cart line as submitted by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Result of pricing a cart against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices a cart against catalog products.
///
/// `products` only needs to contain the products referenced by `lines`;
/// anything missing is reported as [`CoreError::ProductNotFound`].
///
/// Repeated lines for the same product are checked against stock as a sum.
///
/// ## Example
/// ```rust,ignore
/// let priced = price_order(&lines, &products)?;
/// assert_eq!(priced.total, priced.subtotal);
/// ```
pub fn price_order(lines: &[OrderLine], products: &[Product]) -> CoreResult<PricedOrder> {
    validate_order_size(lines.len())?;

    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut requested: HashMap<&str, i64> = HashMap::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        validate_quantity(line.quantity)?;

        let product = by_id
            .get(line.product_id.as_str())
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        let total_requested = requested.entry(product.id.as_str()).or_insert(0);
        *total_requested += line.quantity;

        if !product.can_order(*total_requested) {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock,
                requested: *total_requested,
            });
        }

        items.push(OrderItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price_cents: product.price_cents,
            quantity: line.quantity,
            image: product.primary_image(),
        });
    }

    let subtotal = items
        .iter()
        .try_fold(Money::zero(), |acc, item| item.line_total()?.checked_add(acc))
        .ok_or_else(total_out_of_range)?;
    let shipping = Money::zero();
    let tax = Money::zero();
    let total = subtotal
        .checked_add(shipping)
        .and_then(|sum| sum.checked_add(tax))
        .ok_or_else(total_out_of_range)?;

    Ok(PricedOrder {
        items,
        subtotal,
        shipping,
        tax,
        total,
    })
}

fn total_out_of_range() -> CoreError {
    ValidationError::OutOfRange {
        field: "total".to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// Initial payment record for a new order.
///
/// Cash on delivery starts with a pending settlement; gateway orders get
/// their record when the payment is verified.
pub fn initial_payment_result(method: PaymentMethod, now: DateTime<Utc>) -> Option<PaymentResult> {
    match method {
        PaymentMethod::Cod => Some(PaymentResult::pending(now)),
        PaymentMethod::Razorpay => None,
    }
}

// =============================================================================
// Status State Machine
// =============================================================================

impl OrderStatus {
    /// Delivered and cancelled orders never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position on the fulfilment path. `None` for cancelled.
    const fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// The transition table.
    ///
    /// ```text
    /// from \ to    pend conf proc ship deli canc
    /// pending        -    ✓    ✓    ✓    ✓    ✓
    /// confirmed      ✗    -    ✓    ✓    ✓    ✓
    /// processing     ✗    ✗    -    ✓    ✓    ✓
    /// shipped        ✗    ✗    ✗    -    ✓    ✓
    /// delivered      ✗    ✗    ✗    ✗    -    ✗
    /// cancelled      ✗    ✗    ✗    ✗    ✗    -
    /// ```
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }

        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

/// Column changes for an admin status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Status the order must still be in when the change is written.
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    /// Re-asserting the current status changes nothing but the tracking number.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Plans an admin status update.
///
/// ## Rules
/// - `next` must be reachable in the transition table; re-asserting the
///   current non-terminal status is accepted as a no-op
/// - shipped requires a non-empty tracking number
/// - a tracking number supplied with any other status is still recorded
/// - delivered stamps `delivered_at = max(now, created_at)`
pub fn plan_status_change(
    order: &Order,
    next: OrderStatus,
    tracking_number: Option<&str>,
    now: DateTime<Utc>,
) -> CoreResult<StatusChange> {
    let current = order.order_status;
    let tracking = tracking_number
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let same_open_status = current == next && !current.is_terminal();
    if !same_open_status && !current.can_transition_to(next) {
        return Err(CoreError::InvalidTransition {
            from: current.to_string(),
            to: next.to_string(),
        });
    }

    if next == OrderStatus::Shipped && tracking.is_none() && order.tracking_number.is_none() {
        return Err(CoreError::MissingTrackingNumber);
    }

    let delivered_at = (next == OrderStatus::Delivered && current != next)
        .then(|| now.max(order.created_at));

    Ok(StatusChange {
        from: current,
        to: next,
        tracking_number: tracking,
        delivered_at,
    })
}

/// Plans an admin update of a cash-on-delivery payment status.
///
/// Gateway payments are settled by signature verification only.
pub fn plan_cod_payment_update(
    order: &Order,
    status: PaymentStatus,
    now: DateTime<Utc>,
) -> CoreResult<PaymentResult> {
    if order.payment_method != PaymentMethod::Cod {
        return Err(CoreError::InvalidOperation(
            "Payment status can only be updated for COD orders".to_string(),
        ));
    }

    let mut result = order
        .payment_result
        .clone()
        .unwrap_or_else(|| PaymentResult::pending(now));
    result.payment_status = status;
    result.updated_at = now;
    Ok(result)
}

// =============================================================================
// Gateway Payments
// =============================================================================

/// Checks that `order` can be handed to the gateway for online payment.
pub fn check_gateway_checkout(order: &Order) -> CoreResult<()> {
    if order.payment_method != PaymentMethod::Razorpay {
        return Err(CoreError::InvalidOperation(
            "Order is not set up for online payment".to_string(),
        ));
    }

    let paid = order
        .payment_result
        .as_ref()
        .is_some_and(|p| p.payment_status == PaymentStatus::Completed);
    if paid {
        return Err(CoreError::InvalidOperation("Order is already paid".to_string()));
    }

    Ok(())
}

/// Payment record binding an order to the gateway order created for it.
pub fn awaiting_gateway_payment(gateway_order_id: &str, now: DateTime<Utc>) -> PaymentResult {
    PaymentResult {
        gateway_order_id: Some(gateway_order_id.to_string()),
        ..PaymentResult::pending(now)
    }
}

/// Checks that a payment made against `gateway_order_id` settles `order`.
///
/// Only online orders settle through the gateway, and only with the gateway
/// order recorded for them at create-order time.
pub fn check_gateway_binding(order: &Order, gateway_order_id: &str) -> CoreResult<()> {
    if order.payment_method != PaymentMethod::Razorpay {
        return Err(CoreError::InvalidOperation(
            "Order is not set up for online payment".to_string(),
        ));
    }

    let bound = order
        .payment_result
        .as_ref()
        .and_then(|p| p.gateway_order_id.as_deref());
    if bound != Some(gateway_order_id) {
        return Err(CoreError::InvalidOperation(
            "Payment does not belong to this order".to_string(),
        ));
    }

    Ok(())
}

/// Payment record after a verified gateway payment.
pub fn completed_gateway_payment(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: Option<&str>,
    now: DateTime<Utc>,
) -> PaymentResult {
    PaymentResult {
        gateway_order_id: Some(gateway_order_id.to_string()),
        gateway_payment_id: Some(gateway_payment_id.to_string()),
        signature: signature.map(str::to_string),
        payment_status: PaymentStatus::Completed,
        updated_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProductCategory, ShippingAddress};
    use chrono::Duration;

    fn product(id: &str, name: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            price_cents,
            original_price_cents: None,
            category: ProductCategory::Other,
            brand: None,
            images: vec![format!("https://img.example/{id}.jpg")],
            stock,
            is_active: true,
            rating: 0.0,
            num_reviews: 0,
            tags: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn line(product_id: &str, quantity: i64) -> OrderLine {
        OrderLine {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn order(status: OrderStatus, method: PaymentMethod) -> Order {
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            user_id: "user-1".to_string(),
            items: vec![],
            shipping_address: ShippingAddress::default(),
            payment_method: method,
            subtotal_cents: 0,
            shipping_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            order_status: status,
            payment_result: initial_payment_result(method, now),
            tracking_number: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_price_order_totals() {
        let products = vec![product("a", "Mug", 500, 10), product("b", "Plate", 300, 10)];
        let priced = price_order(&[line("a", 2), line("b", 1)], &products).unwrap();

        assert_eq!(priced.subtotal.cents(), 1300);
        assert_eq!(priced.total.cents(), 1300);
        assert_eq!(priced.shipping.cents(), 0);
        assert_eq!(priced.tax.cents(), 0);
        assert_eq!(priced.items[0].name, "Mug");
        assert_eq!(priced.items[0].image.as_deref(), Some("https://img.example/a.jpg"));
    }

    #[test]
    fn test_price_order_rejects_empty_cart() {
        let err = price_order(&[], &[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_price_order_rejects_missing_and_inactive() {
        let mut inactive = product("a", "Mug", 500, 10);
        inactive.is_active = false;

        let err = price_order(&[line("a", 1)], &[inactive]).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(id) if id == "a"));

        let err = price_order(&[line("zzz", 1)], &[]).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(_)));
    }

    #[test]
    fn test_price_order_insufficient_stock() {
        let products = vec![product("a", "Mug", 500, 3)];
        let err = price_order(&[line("a", 5)], &products).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Mug: available 3, requested 5"
        );
    }

    #[test]
    fn test_price_order_sums_repeated_lines_against_stock() {
        let products = vec![product("a", "Mug", 500, 3)];
        assert!(price_order(&[line("a", 2), line("a", 1)], &products).is_ok());

        let err = price_order(&[line("a", 2), line("a", 2)], &products).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested: 4, .. }));
    }

    #[test]
    fn test_price_order_rejects_bad_quantity() {
        let products = vec![product("a", "Mug", 500, 3)];
        assert!(price_order(&[line("a", 0)], &products).is_err());
    }

    #[test]
    fn test_price_order_rejects_overflowing_total() {
        // Rows written before the price ceiling existed can still hold huge prices
        let products = vec![product("a", "Vault", i64::MAX / 2, 10)];
        let err = price_order(&[line("a", 3)], &products).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "total"
        ));

        let products = vec![
            product("a", "Vault", i64::MAX / 2, 10),
            product("b", "Safe", i64::MAX / 2, 10),
        ];
        assert!(price_order(&[line("a", 1), line("b", 2)], &products).is_err());
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Cancelled));

        assert!(!Shipped.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_shipped_requires_tracking_number() {
        let o = order(OrderStatus::Processing, PaymentMethod::Cod);
        let now = Utc::now();

        let err = plan_status_change(&o, OrderStatus::Shipped, None, now).unwrap_err();
        assert!(matches!(err, CoreError::MissingTrackingNumber));

        let err = plan_status_change(&o, OrderStatus::Shipped, Some("  "), now).unwrap_err();
        assert!(matches!(err, CoreError::MissingTrackingNumber));

        let change = plan_status_change(&o, OrderStatus::Shipped, Some("TRK-42"), now).unwrap();
        assert_eq!(change.tracking_number.as_deref(), Some("TRK-42"));
        assert_eq!(change.delivered_at, None);
    }

    #[test]
    fn test_delivered_stamps_not_before_creation() {
        let mut o = order(OrderStatus::Shipped, PaymentMethod::Cod);
        o.tracking_number = Some("TRK-1".to_string());

        let now = Utc::now();
        let change = plan_status_change(&o, OrderStatus::Delivered, None, now).unwrap();
        assert_eq!(change.delivered_at, Some(now.max(o.created_at)));

        // Clock skew: "now" earlier than creation still yields created_at.
        let skewed = o.created_at - Duration::minutes(5);
        let change = plan_status_change(&o, OrderStatus::Delivered, None, skewed).unwrap();
        assert_eq!(change.delivered_at, Some(o.created_at));
    }

    #[test]
    fn test_terminal_and_backward_transitions_rejected() {
        let now = Utc::now();
        let delivered = order(OrderStatus::Delivered, PaymentMethod::Cod);
        assert!(matches!(
            plan_status_change(&delivered, OrderStatus::Delivered, None, now),
            Err(CoreError::InvalidTransition { .. })
        ));

        let confirmed = order(OrderStatus::Confirmed, PaymentMethod::Cod);
        assert!(matches!(
            plan_status_change(&confirmed, OrderStatus::Pending, None, now),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_reasserting_open_status_is_noop() {
        let o = order(OrderStatus::Processing, PaymentMethod::Cod);
        let change = plan_status_change(&o, OrderStatus::Processing, None, Utc::now()).unwrap();
        assert!(change.is_noop());
    }

    #[test]
    fn test_gateway_binding() {
        let now = Utc::now();
        let mut online = order(OrderStatus::Pending, PaymentMethod::Razorpay);
        assert!(check_gateway_checkout(&online).is_ok());

        // Not yet handed to the gateway
        assert!(check_gateway_binding(&online, "order_GW1").is_err());

        online.payment_result = Some(awaiting_gateway_payment("order_GW1", now));
        assert!(check_gateway_binding(&online, "order_GW1").is_ok());
        assert!(check_gateway_binding(&online, "order_OTHER").is_err());

        online.payment_result = Some(completed_gateway_payment("order_GW1", "pay_1", None, now));
        assert!(check_gateway_binding(&online, "order_GW1").is_ok());
        assert!(matches!(
            check_gateway_checkout(&online),
            Err(CoreError::InvalidOperation(_))
        ));

        let mut cod = order(OrderStatus::Pending, PaymentMethod::Cod);
        assert!(check_gateway_checkout(&cod).is_err());
        cod.payment_result = Some(awaiting_gateway_payment("order_GW1", now));
        assert!(matches!(
            check_gateway_binding(&cod, "order_GW1"),
            Err(CoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_cod_payment_update() {
        let now = Utc::now();
        let cod = order(OrderStatus::Delivered, PaymentMethod::Cod);
        let result = plan_cod_payment_update(&cod, PaymentStatus::Completed, now).unwrap();
        assert_eq!(result.payment_status, PaymentStatus::Completed);

        let online = order(OrderStatus::Pending, PaymentMethod::Razorpay);
        let err = plan_cod_payment_update(&online, PaymentStatus::Completed, now).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
    }
}
