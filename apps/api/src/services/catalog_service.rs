//! Product catalog handlers.
//!
//! Public reads see active products only; admin routes see everything and
//! manage the catalog. Deletion is a soft delete so past orders keep their
//! product reference.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use emporium_core::validation::{
    validate_new_product, validate_price_cents, validate_product_name, validate_rating,
    validate_search_query, validate_stock,
};
use emporium_core::{
    NewProduct, PageRequest, Paginated, Product, ProductCategory, ProductFilter, ProductSort,
    ProductUpdate, SortOrder,
};

use crate::auth::AdminUser;
use crate::error::{ApiJson, ApiQuery, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/admin/all", get(list_all_products))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<ProductCategory>,
    pub search: Option<String>,
    pub sort_by: Option<ProductSort>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    fn into_filter(self, include_inactive: bool) -> ApiResult<(ProductFilter, PageRequest)> {
        let search = match self.search.as_deref() {
            Some(raw) => validate_search_query(raw)?,
            None => None,
        };

        let filter = ProductFilter {
            category: self.category,
            search,
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
            include_inactive,
        };
        Ok((filter, PageRequest::new(self.page, self.limit)))
    }
}

async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Paginated<Product>>> {
    let (filter, page) = query.into_filter(false)?;
    Ok(Json(state.db.products().list(&filter, page).await?))
}

async fn list_all_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Json<Paginated<Product>>> {
    let (filter, page) = query.into_filter(true)?;
    Ok(Json(state.db.products().list(&filter, page).await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get_active(&id).await?))
}

async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(new): ApiJson<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    validate_new_product(&new)?;

    let product = state.db.products().insert(&new).await?;
    info!(product_id = %product.id, admin_id = %admin.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> ApiResult<Json<Product>> {
    if let Some(name) = &update.name {
        validate_product_name(name)?;
    }
    if let Some(price_cents) = update.price_cents {
        validate_price_cents(price_cents)?;
    }
    if let Some(stock) = update.stock {
        validate_stock(stock)?;
    }
    if let Some(rating) = update.rating {
        validate_rating(rating)?;
    }

    let product = state.db.products().update(&id, &update).await?;
    info!(product_id = %id, admin_id = %admin.id, "Product updated");
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.db.products().soft_delete(&id).await?;
    info!(product_id = %id, admin_id = %admin.id, "Product deactivated");
    Ok(Json(json!({ "message": "Product removed successfully" })))
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_public_listing_hides_deleted_products() {
        let app = test_app().await;
        let (_, token) = app.admin().await;
        let lamp = app.product("Desk Lamp", 1999, 4).await;
        app.product("Floor Lamp", 4999, 2).await;

        let (status, _) = app
            .delete(&format!("/api/products/{}", lamp.id), Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.get("/api/products?search=lamp", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["name"], "Floor Lamp");

        let (status, _) = app.get(&format!("/api/products/{}", lamp.id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = app.get("/api/products/admin/all", Some(&token)).await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_sorting_by_price() {
        let app = test_app().await;
        app.product("Mug", 500, 10).await;
        app.product("Kettle", 2500, 10).await;
        app.product("Spoon", 100, 10).await;

        let (_, body) = app
            .get("/api/products?sortBy=price&sortOrder=asc&limit=2", None)
            .await;
        assert_eq!(body["items"][0]["name"], "Spoon");
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["totalPages"], 2);
    }

    #[tokio::test]
    async fn test_admin_create_and_update() {
        let app = test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, customer_token) = app.customer("c@example.com").await;

        let new_product = json!({
            "name": "Headphones",
            "description": "Over-ear",
            "priceCents": 7999,
            "category": "electronics",
            "stock": 3
        });

        let (status, _) = app
            .post("/api/products", Some(&customer_token), new_product.clone())
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app
            .post("/api/products", Some(&admin_token), new_product)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap();

        let (status, _) = app
            .put(&format!("/api/products/{id}"), Some(&admin_token), json!({ "stock": -1 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .put(
                &format!("/api/products/{id}"),
                Some(&admin_token),
                json!({ "priceCents": i64::MAX / 2 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = app
            .put(
                &format!("/api/products/{id}"),
                Some(&admin_token),
                json!({ "priceCents": 6999 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["priceCents"], 6999);
        assert_eq!(updated["stock"], 3);
    }
}
