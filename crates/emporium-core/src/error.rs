//! # Error Types
//!
//! Domain-specific error types for emporium-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  emporium-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── OtpError         - One-time password verification failures        │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  emporium-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - HTTP status + {"message": ...}                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Client                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be ordered.
    ///
    /// ## When This Occurs
    /// - Product ID doesn't exist in the catalog
    /// - Product was soft-deleted (`is_active = false`)
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to fulfil an order line.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (Headphones × 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Headphones", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Client shows: "Insufficient stock for Headphones"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Requested status change is not in the transition table.
    ///
    /// ## When This Occurs
    /// - Moving a delivered or cancelled order anywhere
    /// - Moving an order backwards (shipped → confirmed)
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Moving an order to shipped without a tracking number.
    #[error("Tracking number is required when marking an order as shipped")]
    MissingTrackingNumber,

    /// Operation does not apply to the entity in its current shape.
    ///
    /// ## When This Occurs
    /// - Updating payment status of an order that isn't cash on delivery
    /// - Toggling the status of an admin account
    #[error("{0}")]
    InvalidOperation(String),

    /// Payment or webhook signature did not match.
    ///
    /// Never carries the secret or the presented signature.
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// OTP Error
// =============================================================================

/// One-time password verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    /// No record for this email and purpose (never sent, consumed or purged).
    #[error("OTP not found or already used. Please request a new one")]
    NotFound,

    /// Wrong code or expired record. The attempt was counted.
    #[error("Invalid or expired OTP")]
    InvalidOrExpired,

    /// Attempt limit reached. The record has been purged.
    #[error("Too many failed attempts. Please request a new OTP")]
    TooManyAttempts,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email, invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
