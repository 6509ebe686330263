//! Error types for the API.
//!
//! Every failure reaching a handler becomes an [`ApiError`], which renders
//! as an HTTP status plus `{"message": "..."}`.
//!
//! ```text
//! ValidationError ─► CoreError ─┐
//! DbError ──────────────────────┤
//! OtpError ─────────────────────┼─► ApiError ─► (status, {"message"})
//! MailError / KvError ──────────┤
//! GatewayError / JSON rejection ┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use emporium_core::{CoreError, OtpError, ValidationError};
use emporium_db::DbError;

use crate::email::MailError;
use crate::gateway::GatewayError;
use crate::kv::KvError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// ## When This Occurs
    /// - Registering an email that is already verified
    /// - A unique column collides
    /// - An order changed status between read and write
    #[error("{0}")]
    Conflict(String),

    /// ## When This Occurs
    /// - Checkout requests more units than are on hand
    /// - Stock ran out between pricing and the stock reservation
    #[error("{0}")]
    InsufficientStock(String),

    /// Gateway signature did not verify. Never carries the signature.
    #[error("Invalid payment signature")]
    InvalidSignature,

    /// Request is well-formed but not allowed in the current state.
    #[error("{0}")]
    InvalidOperation(String),

    /// The mail transport did not accept an OTP email.
    #[error("Failed to send email. Please try again later")]
    DeliveryFailed,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    TooManyAttempts(String),

    /// Logged server-side, rendered as a generic message.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidSignature | ApiError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) | ApiError::InsufficientStock(_) => StatusCode::CONFLICT,
            ApiError::DeliveryFailed | ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::TooManyAttempts(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "API request error");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Gateway(_) => "Payment gateway error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(_) | CoreError::OrderNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::InsufficientStock { .. } => ApiError::InsufficientStock(err.to_string()),
            CoreError::InvalidTransition { .. } | CoreError::InvalidOperation(_) => {
                ApiError::InvalidOperation(err.to_string())
            }
            CoreError::MissingTrackingNumber => ApiError::Validation(err.to_string()),
            CoreError::InvalidSignature => ApiError::InvalidSignature,
            CoreError::Validation(inner) => inner.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found")),
            DbError::UniqueViolation { .. } => ApiError::Conflict(err.to_string()),
            DbError::StaleState { .. } => ApiError::Conflict(err.to_string()),
            DbError::StockConflict { .. } => {
                ApiError::InsufficientStock("Insufficient stock for one or more products".to_string())
            }
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                ApiError::Validation(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::NotFound => ApiError::NotFound(err.to_string()),
            OtpError::InvalidOrExpired => ApiError::Validation(err.to_string()),
            OtpError::TooManyAttempts => ApiError::TooManyAttempts(err.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::InvalidAddress(_) => ApiError::Validation(err.to_string()),
            _ => {
                tracing::warn!(error = %err, "Email delivery failed");
                ApiError::DeliveryFailed
            }
        }
    }
}

impl From<KvError> for ApiError {
    fn from(err: KvError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// `axum::Json` whose rejection renders as an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejection renders as an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(ApiError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ApiError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ApiError::DeliveryFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ApiError::InvalidSignature), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ApiError::Internal("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        assert_eq!(
            status_of(CoreError::InsufficientStock {
                product: "Lamp".into(),
                available: 1,
                requested: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DbError::StockConflict {
                product_id: "p".into(),
                requested: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(DbError::stale("Order", "o")), StatusCode::CONFLICT);
        assert_eq!(status_of(DbError::duplicate("email", "a@b.c")), StatusCode::CONFLICT);
        assert_eq!(status_of(DbError::not_found("Order", "o")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(OtpError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(OtpError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(OtpError::InvalidOrExpired), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CoreError::InvalidTransition {
                from: "delivered".into(),
                to: "pending".into(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(MailError::Delivery("connection refused".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(MailError::NotConfigured), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = ApiError::Internal("disk I/O error at /var/lib".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }
}
