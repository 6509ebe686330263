//! HTTP handlers, one module per resource.
//!
//! Each module exposes `routes()`, nested under `/api` by [`router`].
//! Handlers stay thin: validate, call emporium-core for rules and
//! emporium-db for storage, map errors through [`crate::error::ApiError`].

pub mod auth_service;
pub mod catalog_service;
pub mod contact_service;
pub mod health_service;
pub mod offer_service;
pub mod order_service;
pub mod otp_service;
pub mod payment_service;
pub mod user_service;

use axum::Router;

use crate::state::AppState;

/// All resource routers, relative to `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/health", health_service::routes())
        .nest("/auth", auth_service::routes())
        .nest("/products", catalog_service::routes())
        .nest("/orders", order_service::routes())
        .nest("/payments", payment_service::routes())
        .nest("/offers", offer_service::routes())
        .nest("/users", user_service::routes())
        .nest("/contact", contact_service::routes())
}
