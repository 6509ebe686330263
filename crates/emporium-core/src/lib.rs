//! # emporium-core: Pure Business Logic for Emporium
//!
//! All storefront rules live here as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Storefront / Admin (React, external)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP + JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum routes)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ emporium-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌───────┐  │   │
//! │  │   │  order  │ │  offer  │ │   otp   │ │ signature │ │ money │  │   │
//! │  │   │ pricing │ │ pricing │ │ attempts│ │ HMAC-256  │ │ cents │  │   │
//! │  │   │ status  │ │ window  │ │ expiry  │ │           │ │       │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └───────────┘ └───────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 emporium-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, Offer, User, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`order`] - Order pricing and the status state machine
//! - [`offer`] - Discount computation and repricing
//! - [`otp`] - One-time password records and attempt rules
//! - [`signature`] - Payment gateway HMAC-SHA256 signatures
//! - [`notification`] - Capped admin notification feeds
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use emporium_core::money::Money;
//!
//! let price = Money::from_cents(50_000); // ₹500.00
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 100_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod notification;
pub mod offer;
pub mod order;
pub mod otp;
pub mod signature;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, OtpError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line in an order.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest catalog price in minor units (₹1 crore).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Maximum number of lines in a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Minimum password length for customer accounts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Lifetime of a one-time password.
pub const OTP_TTL_MINUTES: i64 = 10;

/// How long an expired OTP record is kept so late attempts still count.
pub const OTP_GRACE_MINUTES: i64 = 5;

/// Failed verifications after which an OTP record is purged.
pub const MAX_OTP_ATTEMPTS: u32 = 3;

/// Entries kept per admin notification feed.
pub const NOTIFICATION_CAP: usize = 10;

/// Entries returned by the "recent" notification endpoints.
pub const RECENT_NOTIFICATIONS: usize = 5;

/// Default page size for paginated admin listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound on page size.
pub const MAX_PAGE_SIZE: u32 = 100;
