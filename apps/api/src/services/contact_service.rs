//! Contact form submission and admin triage.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use emporium_core::notification::{Notification, NotificationKind};
use emporium_core::validation::validate_new_contact;
use emporium_core::{
    ContactApplication, ContactFilter, ContactPriority, ContactStats, ContactStatus, ContactUpdate,
    NewContact, PageRequest, Paginated, RECENT_NOTIFICATIONS,
};

use crate::auth::AdminUser;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submit", post(submit))
        .route("/applications", get(list_applications))
        .route(
            "/applications/{id}",
            get(get_application).put(update_application).delete(delete_application),
        )
        .route("/admin/stats", get(stats))
        .route("/admin/recent", get(recent_notifications))
        .route("/admin/clear-notifications", post(clear_notifications))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub status: Option<ContactStatus>,
    pub priority: Option<ContactPriority>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn submit(
    State(state): State<AppState>,
    ApiJson(contact): ApiJson<NewContact>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let email = validate_new_contact(&contact)?;

    let application = state.db.contacts().insert(&contact, &email).await?;
    info!(contact_id = %application.id, "Contact application received");

    state
        .feed(NotificationKind::Contacts)
        .notify(
            &application.id,
            format!("New message from {}: {}", application.name, application.subject),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Thank you for contacting us. We will get back to you soon.",
            "id": application.id,
        })),
    ))
}

async fn list_applications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<ContactQuery>,
) -> ApiResult<Json<Paginated<ContactApplication>>> {
    let filter = ContactFilter {
        status: query.status,
        priority: query.priority,
    };
    let page = PageRequest::new(query.page, query.limit);
    Ok(Json(state.db.contacts().list(filter, page).await?))
}

/// Opening a new application marks it read.
async fn get_application(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ContactApplication>> {
    Ok(Json(state.db.contacts().open(&id).await?))
}

async fn update_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ContactUpdate>,
) -> ApiResult<Json<ContactApplication>> {
    let application = state.db.contacts().update(&id, &update).await?;
    info!(contact_id = %id, admin_id = %admin.id, status = ?application.status, "Contact application updated");
    Ok(Json(application))
}

async fn delete_application(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.contacts().delete(&id).await?;
    info!(contact_id = %id, admin_id = %admin.id, "Contact application deleted");
    Ok(Json(json!({ "message": "Contact application deleted successfully" })))
}

async fn stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<ContactStats>> {
    Ok(Json(state.db.contacts().stats().await?))
}

async fn recent_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let recent = state
        .feed(NotificationKind::Contacts)
        .recent(RECENT_NOTIFICATIONS)
        .await?;
    Ok(Json(recent))
}

async fn clear_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Value>> {
    state.feed(NotificationKind::Contacts).mark_all_read().await?;
    Ok(Json(json!({ "message": "Contact notifications cleared" })))
}
