//! # Offer Engine
//!
//! Discount computation for time-windowed offers.
//!
//! ## Repricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create offer (10% on Lamp)                                             │
//! │                                                                         │
//! │  Lamp { price: 1000, original: None }                                   │
//! │       │ baseline = original.unwrap_or(price) = 1000                     │
//! │       │ discount = 1000 × 10% = 100 (capped by max_discount)            │
//! │       ▼                                                                 │
//! │  Lamp { price: 900, original: 1000 }                                    │
//! │                                                                         │
//! │  delete offer                                                           │
//! │       ▼                                                                 │
//! │  Lamp { price: 1000, original: None }                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A second offer on an already discounted product is computed from the
//! same baseline, so discounts never compound.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{DiscountType, Offer};

impl Offer {
    /// Active flag set and `now` inside `[start_date, end_date]`.
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}

/// Discount on `baseline`, capped by `max_discount` and never above the baseline.
///
/// ## Example
/// ```rust
/// use emporium_core::money::Money;
/// use emporium_core::offer::discount_amount;
/// use emporium_core::types::DiscountType;
///
/// let base = Money::from_cents(1000);
/// assert_eq!(discount_amount(base, DiscountType::Percentage, 1000, None).cents(), 100);
/// assert_eq!(discount_amount(base, DiscountType::Fixed, 5000, None).cents(), 1000);
/// ```
pub fn discount_amount(
    baseline: Money,
    discount_type: DiscountType,
    value: i64,
    max_discount: Option<Money>,
) -> Money {
    let raw = match discount_type {
        DiscountType::Percentage => baseline.percentage(value),
        DiscountType::Fixed => Money::from_cents(value),
    };

    let capped = match max_discount {
        Some(cap) => raw.min(cap),
        None => raw,
    };

    capped.clamp(Money::zero(), baseline.max(Money::zero()))
}

/// New price columns for a product an offer applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repricing {
    pub price_cents: i64,
    pub original_price_cents: i64,
}

/// Reprices a product for an offer.
///
/// `original_price_cents` is captured on first discount and kept afterwards.
pub fn reprice(price_cents: i64, original_price_cents: Option<i64>, offer: &Offer) -> Repricing {
    let baseline = Money::from_cents(original_price_cents.unwrap_or(price_cents));
    let discount = discount_amount(
        baseline,
        offer.discount_type,
        offer.discount_value,
        offer.max_discount_cents.map(Money::from_cents),
    );

    Repricing {
        price_cents: baseline.saturating_sub(discount).cents(),
        original_price_cents: baseline.cents(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(discount_type: DiscountType, value: i64, cap: Option<i64>) -> Offer {
        let now = Utc::now();
        Offer {
            id: "offer-1".to_string(),
            title: "Festive".to_string(),
            description: String::new(),
            discount_type,
            discount_value: value,
            min_order_cents: None,
            max_discount_cents: cap,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            usage_limit: None,
            used_count: 0,
            is_active: true,
            product_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage_reprice_captures_original() {
        let r = reprice(1000, None, &offer(DiscountType::Percentage, 1000, None));
        assert_eq!(r.price_cents, 900);
        assert_eq!(r.original_price_cents, 1000);
    }

    #[test]
    fn test_cap_limits_discount() {
        let r = reprice(10_000, None, &offer(DiscountType::Percentage, 5000, Some(1500)));
        assert_eq!(r.price_cents, 8_500);
    }

    #[test]
    fn test_fixed_discount_never_goes_negative() {
        let r = reprice(300, None, &offer(DiscountType::Fixed, 500, None));
        assert_eq!(r.price_cents, 0);
        assert_eq!(r.original_price_cents, 300);
    }

    #[test]
    fn test_second_offer_uses_baseline() {
        let first = reprice(1000, None, &offer(DiscountType::Percentage, 1000, None));
        let second = reprice(
            first.price_cents,
            Some(first.original_price_cents),
            &offer(DiscountType::Percentage, 2000, None),
        );
        assert_eq!(second.price_cents, 800);
        assert_eq!(second.original_price_cents, 1000);
    }

    #[test]
    fn test_currently_active_window() {
        let now = Utc::now();
        let mut o = offer(DiscountType::Fixed, 100, None);
        assert!(o.is_currently_active(now));

        o.is_active = false;
        assert!(!o.is_currently_active(now));

        o.is_active = true;
        o.start_date = now + Duration::hours(1);
        assert!(!o.is_currently_active(now));

        o.start_date = now - Duration::days(2);
        o.end_date = now - Duration::days(1);
        assert!(!o.is_currently_active(now));
    }
}
