//! Registration, login, password reset and profile handlers.
//!
//! ```text
//! POST /api/auth/send-otp          registration code
//! POST /api/auth/verify-otp        code + name + password → account + token
//! POST /api/auth/forgot-password   reset code
//! POST /api/auth/reset-password    code + new password
//! POST /api/auth/login             email + password → token
//! GET  /api/auth/profile           current user
//! PUT  /api/auth/profile           edit current user
//! ```

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use emporium_core::notification::NotificationKind;
use emporium_core::otp::OtpPurpose;
use emporium_core::validation::{
    validate_email, validate_otp_code, validate_password, validate_person_name,
    validate_required, validate_shipping_address,
};
use emporium_core::{ProfileUpdate, User};
use emporium_db::ProfileChanges;

use crate::auth::{hash_password_async, verify_password_async, AuthUser};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::services::otp_service::{check_otp, consume_otp, send_otp, verify_otp};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(send_registration_otp))
        .route("/verify-otp", post(verify_registration))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/login", post(login))
        .route("/profile", get(profile).put(update_profile))
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A user profile with a freshly issued bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn send_registration_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<Value>> {
    let email = validate_email(&req.email)?;

    if let Some(existing) = state.db.users().find_by_email(&email).await? {
        if existing.user.is_email_verified {
            return Err(ApiError::Conflict("Email already registered and verified".to_string()));
        }
    }

    send_otp(&state, &email, OtpPurpose::Registration).await?;

    Ok(Json(json!({
        "message": "OTP sent to your email",
        "email": email,
    })))
}

async fn verify_registration(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = validate_email(&req.email)?;
    validate_otp_code(&req.otp)?;
    validate_person_name(&req.name)?;
    validate_password(&req.password)?;

    verify_otp(&state, &email, &req.otp, OtpPurpose::Registration).await?;

    let users = state.db.users();
    if let Some(existing) = users.find_by_email(&email).await? {
        if existing.user.is_email_verified {
            return Err(ApiError::Conflict("User already exists and is verified".to_string()));
        }
    }

    let hash = hash_password_async(req.password.clone()).await?;
    let user = users.upsert_verified(req.name.trim(), &email, &hash).await?;
    info!(user_id = %user.id, "User registered");

    state
        .feed(NotificationKind::Users)
        .notify(&user.id, format!("New user registered: {} ({})", user.name, user.email))
        .await;

    let token = state.jwt.generate_token(&user)?;
    Ok(Json(AuthResponse { user, token }))
}

async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<Value>> {
    let email = validate_email(&req.email)?;

    let account = state.db.users().find_by_email(&email).await?;
    if !account.is_some_and(|c| c.user.is_email_verified) {
        return Err(ApiError::NotFound(
            "No account found with this email address".to_string(),
        ));
    }

    send_otp(&state, &email, OtpPurpose::PasswordReset).await?;

    Ok(Json(json!({ "message": "Password reset OTP sent to your email" })))
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let email = validate_email(&req.email)?;
    validate_otp_code(&req.otp)?;
    validate_password(&req.new_password)?;

    // The code stays valid if the new password is rejected below
    check_otp(&state, &email, &req.otp, OtpPurpose::PasswordReset).await?;

    let users = state.db.users();
    let credentials = users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if let Some(current) = credentials.password_hash.clone() {
        if verify_password_async(req.new_password.clone(), current).await? {
            return Err(ApiError::Validation(
                "New password must be different from your current password".to_string(),
            ));
        }
    }

    let hash = hash_password_async(req.new_password.clone()).await?;
    consume_otp(&state, &email).await?;
    users.set_password(&credentials.user.id, &hash).await?;
    info!(user_id = %credentials.user.id, "Password reset");

    Ok(Json(json!({
        "message": "Password reset successfully. You can now login with your new password."
    })))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    validate_required("email", &req.email)?;
    validate_required("password", &req.password)?;
    let email = req.email.trim().to_lowercase();

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let credentials = state.db.users().find_by_email(&email).await?.ok_or_else(invalid)?;

    if !credentials.user.is_email_verified {
        return Err(ApiError::Unauthorized("Please verify your email first".to_string()));
    }

    if !credentials.user.is_active {
        return Err(ApiError::Unauthorized(
            "Account is deactivated. Please contact support".to_string(),
        ));
    }

    let matches = match credentials.password_hash.clone() {
        Some(hash) => verify_password_async(req.password.clone(), hash).await?,
        None => false,
    };
    if !matches {
        return Err(invalid());
    }

    let user = credentials.user;
    let token = state.jwt.generate_token(&user)?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { user, token }))
}

async fn profile(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    if let Some(name) = &update.name {
        validate_person_name(name)?;
    }
    if let Some(address) = &update.address {
        validate_shipping_address(address)?;
    }

    let users = state.db.users();
    let password_hash = match &update.password {
        Some(password) => {
            validate_password(password)?;
            let credentials = users.credentials(&user.id).await?;
            if let Some(current) = credentials.password_hash {
                if verify_password_async(password.clone(), current).await? {
                    return Err(ApiError::Validation(
                        "New password must be different from your current password".to_string(),
                    ));
                }
            }
            Some(hash_password_async(password.clone()).await?)
        }
        None => None,
    };

    let changes = ProfileChanges {
        name: update.name.map(|name| name.trim().to_string()),
        phone: update.phone,
        address: update.address,
        password_hash,
    };

    Ok(Json(users.update_profile(&user.id, &changes).await?))
}
