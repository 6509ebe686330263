//! Admin user management.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Datelike, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use emporium_core::notification::{Notification, NotificationKind};
use emporium_core::{PageRequest, Paginated, User, UserStats, RECENT_NOTIFICATIONS};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/stats/overview", get(stats))
        .route("/admin/recent", get(recent_notifications))
        .route("/admin/clear-notifications", post(clear_notifications))
        .route("/{id}", get(get_user))
        .route("/{id}/toggle-status", put(toggle_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Paginated<User>>> {
    let page = PageRequest::new(query.page, query.limit);
    Ok(Json(state.db.users().list_customers(page).await?))
}

async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users().get(&id).await?))
}

/// Blocks or unblocks a customer. Admin accounts are not toggleable.
async fn toggle_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let users = state.db.users();
    let user = users.get(&id).await?;

    if user.is_admin() {
        return Err(ApiError::InvalidOperation("Cannot modify admin user".to_string()));
    }

    let user = users.set_active(&id, !user.is_active).await?;
    let verb = if user.is_active { "activated" } else { "deactivated" };
    info!(user_id = %id, admin_id = %admin.id, is_active = user.is_active, "User status toggled");

    Ok(Json(json!({
        "message": format!("User {verb} successfully"),
        "user": user,
    })))
}

async fn stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<UserStats>> {
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);

    Ok(Json(state.db.users().stats(month_start).await?))
}

async fn recent_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let recent = state
        .feed(NotificationKind::Users)
        .recent(RECENT_NOTIFICATIONS)
        .await?;
    Ok(Json(recent))
}

async fn clear_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Value>> {
    state.feed(NotificationKind::Users).mark_all_read().await?;
    Ok(Json(json!({ "message": "User notifications cleared" })))
}
