//! # Emporium API
//!
//! REST backend for the storefront and its admin dashboard.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Emporium API                                    │
//! │                                                                         │
//! │  /api/auth      OTP registration, login, password reset, profile       │
//! │  /api/products  catalog (public reads, admin writes)                   │
//! │  /api/orders    checkout, status lifecycle, COD payments               │
//! │  /api/payments  gateway orders, signature checks, webhook              │
//! │  /api/offers    time-boxed discounts that reprice products             │
//! │  /api/users     admin user management                                  │
//! │  /api/contact   contact form and triage                                │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │
//! │  │  SQLite      │  │  KV store    │  │  SMTP        │  │  Razorpay  │  │
//! │  │  emporium-db │  │  memory or   │  │  OTP mail    │  │  orders    │  │
//! │  │              │  │  Redis       │  │  or outbox   │  │            │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Loaded by [`config::ApiConfig::load`] from `emporium.toml` and
//! `EMPORIUM_*` environment variables, e.g. `EMPORIUM_HTTP_PORT`,
//! `EMPORIUM_DATABASE_PATH`, `EMPORIUM_JWT_SECRET`, `EMPORIUM_REDIS_URL`.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod kv;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api", services::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Allows the listed origins, or any origin when the list is empty.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
