//! # Repository Module
//!
//! Database repository implementations for Emporium.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Route handler / service                                               │
//! │       │                                                                 │
//! │       │  db.orders().place(&order, &reservations)                      │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── place(...)          ← one transaction, conditional decrements     │
//! │  ├── get(id)                                                           │
//! │  └── update_status(...)  ← guarded by the expected current status      │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into private `*Row` structs with `sqlx::FromRow` and
//! converted into core types; JSON columns go through `sqlx::types::Json`.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog listing and admin CRUD
//! - [`OrderRepository`](order::OrderRepository) - Placement, lookup, status and payment updates
//! - [`OfferRepository`](offer::OfferRepository) - Offers with transactional repricing
//! - [`UserRepository`](user::UserRepository) - Accounts and credentials
//! - [`ContactRepository`](contact::ContactRepository) - Contact form applications

pub mod contact;
pub mod offer;
pub mod order;
pub mod product;
pub mod user;

/// Generates a new entity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
