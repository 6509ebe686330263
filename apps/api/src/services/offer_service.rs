//! Offer handlers.
//!
//! Creating an offer reprices its products and deleting it restores them,
//! both inside one transaction in emporium-db. Edits change the offer row
//! only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use emporium_core::validation::{validate_new_offer, validate_offer_window, validate_required};
use emporium_core::{NewOffer, Offer, OfferUpdate};

use crate::auth::AdminUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(active_offers).post(create_offer))
        .route("/admin", get(all_offers))
        .route("/{id}", put(update_offer).delete(delete_offer))
}

/// Offers whose window contains now.
async fn active_offers(State(state): State<AppState>) -> ApiResult<Json<Vec<Offer>>> {
    Ok(Json(state.db.offers().list_active(Utc::now()).await?))
}

async fn all_offers(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> ApiResult<Json<Vec<Offer>>> {
    Ok(Json(state.db.offers().list_all().await?))
}

async fn create_offer(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(new): ApiJson<NewOffer>,
) -> ApiResult<(StatusCode, Json<Offer>)> {
    validate_new_offer(&new)?;

    let offer = state.db.offers().insert_with_repricing(&new).await?;
    info!(
        offer_id = %offer.id,
        admin_id = %admin.id,
        products = offer.product_ids.len(),
        "Offer created"
    );
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn update_offer(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<OfferUpdate>,
) -> ApiResult<Json<Offer>> {
    if let Some(title) = &update.title {
        validate_required("title", title)?;
    }

    let offers = state.db.offers();
    let current = offers.get(&id).await?;
    validate_offer_window(
        update.start_date.unwrap_or(current.start_date),
        update.end_date.unwrap_or(current.end_date),
    )?;

    let offer = offers.update(&id, &update).await?;
    info!(offer_id = %id, admin_id = %admin.id, "Offer updated");
    Ok(Json(offer))
}

async fn delete_offer(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.offers().delete_and_restore(&id).await?;
    info!(offer_id = %id, admin_id = %admin.id, "Offer deleted, prices restored");
    Ok(Json(json!({ "message": "Offer deleted successfully" })))
}
