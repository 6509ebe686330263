//! # Validation Module
//!
//! Input validation for Emporium.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend (React forms)                                       │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: API (Rust)                                                   │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (price_cents >= 0)                      │
//! │  └── UNIQUE (users.email)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::types::{DiscountType, NewContact, NewOffer, NewProduct, ShippingAddress};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_CENTS, MIN_PASSWORD_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a field is present after trimming.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates and normalizes an email address.
///
/// ## Rules
/// - `local@domain.tld` with no whitespace
/// - exactly one `@`, a dot in the domain with text on both sides
///
/// ## Returns
/// The trimmed, lowercased address.
///
/// ## Example
/// ```rust
/// use emporium_core::validation::validate_email;
///
/// assert_eq!(validate_email(" Asha@Example.COM ").unwrap(), "asha@example.com");
/// assert!(validate_email("asha@example").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    let invalid = || ValidationError::invalid_format("email", "please enter a valid email");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => {}
        _ => return Err(invalid()),
    }

    Ok(email.to_lowercase())
}

/// Validates a password.
///
/// ## Rules
/// - At least [`MIN_PASSWORD_LEN`] characters
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(())
}

/// Validates a person's display name (1-100 characters).
pub fn validate_person_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a catalog search query (at most 100 characters).
///
/// ## Returns
/// The trimmed query, or `None` when empty.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok((!query.is_empty()).then(|| query.to_string()))
}

/// Validates a six digit one-time password.
pub fn validate_otp_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("otp"));
    }

    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("otp", "must be 6 digits"));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed, MAX_PRICE_CENTS is
/// the ceiling.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a review score (0 to 5).
pub fn validate_rating(rating: f64) -> ValidationResult<()> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(ValidationError::OutOfRange {
            field: "rating".to_string(),
            min: 0,
            max: 5,
        });
    }

    Ok(())
}

/// Validates the number of lines in an order.
pub fn validate_order_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::required("items"));
    }

    if lines > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a shipping address. Every part is required.
pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    validate_required("street", &address.street)?;
    validate_required("city", &address.city)?;
    validate_required("state", &address.state)?;
    validate_required("zipCode", &address.zip_code)?;
    validate_required("country", &address.country)?;
    Ok(())
}

/// Validates a new catalog product.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_required("description", &product.description)?;
    validate_price_cents(product.price_cents)?;
    validate_stock(product.stock)?;
    Ok(())
}

/// Validates a discount amount for its type.
///
/// ## Rules
/// - Must be positive
/// - Percentages may not exceed 100% (10000 bps)
pub fn validate_discount(discount_type: DiscountType, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "discountValue".to_string(),
        });
    }

    if discount_type == DiscountType::Percentage && value > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discountValue".to_string(),
            min: 1,
            max: 10_000,
        });
    }

    Ok(())
}

/// Validates that an offer window ends after it starts.
pub fn validate_offer_window(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::invalid_format(
            "endDate",
            "must be after startDate",
        ));
    }
    Ok(())
}

/// Validates a new offer.
pub fn validate_new_offer(offer: &NewOffer) -> ValidationResult<()> {
    validate_required("title", &offer.title)?;
    validate_discount(offer.discount_type, offer.discount_value)?;
    validate_offer_window(offer.start_date, offer.end_date)?;

    if let Some(cap) = offer.max_discount_cents {
        validate_price_cents(cap)?;
    }
    if let Some(min) = offer.min_order_cents {
        validate_price_cents(min)?;
    }

    Ok(())
}

/// Validates a contact form submission. All fields are required.
pub fn validate_new_contact(contact: &NewContact) -> ValidationResult<String> {
    validate_required("name", &contact.name)?;
    validate_required("subject", &contact.subject)?;
    validate_required("message", &contact.message)?;
    validate_email(&contact.email)
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use emporium_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid_format("id", "Invalid ID format"))?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
