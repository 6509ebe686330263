//! # Offer Repository
//!
//! Offers and the product repricing they drive.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert_with_repricing(new)            one transaction                  │
//! │   ├── INSERT INTO offers                                                │
//! │   └── for each product id                                               │
//! │         unknown?  → skipped (warn)                                      │
//! │         reprice(price, original, offer)   (emporium-core)               │
//! │         UPDATE products SET price, original                             │
//! │         INSERT INTO offer_products                                      │
//! │                                                                         │
//! │  delete_and_restore(id)                one transaction                  │
//! │   ├── UPDATE products SET price = original, original = NULL             │
//! │   │     for linked products still carrying an original price            │
//! │   └── DELETE FROM offers (links cascade)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Editing an offer never reprices; only create and delete touch products.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use emporium_core::offer::reprice;
use emporium_core::{DiscountType, NewOffer, Offer, OfferUpdate};

const OFFER_COLUMNS: &str = "id, title, description, discount_type, discount_value, \
     min_order_cents, max_discount_cents, start_date, end_date, usage_limit, used_count, \
     is_active, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OfferRow {
    id: String,
    title: String,
    description: String,
    discount_type: DiscountType,
    discount_value: i64,
    min_order_cents: Option<i64>,
    max_discount_cents: Option<i64>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    usage_limit: Option<i64>,
    used_count: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OfferRow {
    fn into_offer(self, product_ids: Vec<String>) -> Offer {
        Offer {
            id: self.id,
            title: self.title,
            description: self.description,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            min_order_cents: self.min_order_cents,
            max_discount_cents: self.max_discount_cents,
            start_date: self.start_date,
            end_date: self.end_date,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            is_active: self.is_active,
            product_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for offers.
#[derive(Debug, Clone)]
pub struct OfferRepository {
    pool: SqlitePool,
}

impl OfferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OfferRepository { pool }
    }

    /// Creates an offer and reprices its products in one transaction.
    ///
    /// The returned offer lists only the products that exist.
    pub async fn insert_with_repricing(&self, new: &NewOffer) -> DbResult<Offer> {
        let now = Utc::now();
        let mut offer = Offer {
            id: generate_id(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            discount_type: new.discount_type,
            discount_value: new.discount_value,
            min_order_cents: new.min_order_cents,
            max_discount_cents: new.max_discount_cents,
            start_date: new.start_date,
            end_date: new.end_date,
            usage_limit: new.usage_limit,
            used_count: 0,
            is_active: new.is_active,
            product_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(offer_id = %offer.id, products = new.product_ids.len(), "Creating offer");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO offers (
                id, title, description, discount_type, discount_value,
                min_order_cents, max_discount_cents, start_date, end_date,
                usage_limit, used_count, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.title)
        .bind(&offer.description)
        .bind(offer.discount_type)
        .bind(offer.discount_value)
        .bind(offer.min_order_cents)
        .bind(offer.max_discount_cents)
        .bind(offer.start_date)
        .bind(offer.end_date)
        .bind(offer.usage_limit)
        .bind(offer.used_count)
        .bind(offer.is_active)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&mut *tx)
        .await?;

        for product_id in &new.product_ids {
            if offer.product_ids.contains(product_id) {
                continue;
            }

            let prices: Option<(i64, Option<i64>)> = sqlx::query_as(
                "SELECT price_cents, original_price_cents FROM products WHERE id = ?1",
            )
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((price_cents, original_price_cents)) = prices else {
                warn!(offer_id = %offer.id, product_id = %product_id, "Offer references unknown product, skipping");
                continue;
            };

            let repriced = reprice(price_cents, original_price_cents, &offer);

            sqlx::query(
                r#"
                UPDATE products
                SET price_cents = ?2, original_price_cents = ?3, updated_at = ?4
                WHERE id = ?1
                "#,
            )
            .bind(product_id)
            .bind(repriced.price_cents)
            .bind(repriced.original_price_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO offer_products (offer_id, product_id) VALUES (?1, ?2)")
                .bind(&offer.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;

            debug!(
                product_id = %product_id,
                price_cents = repriced.price_cents,
                original_price_cents = repriced.original_price_cents,
                "Product repriced"
            );
            offer.product_ids.push(product_id.clone());
        }

        tx.commit().await?;

        info!(
            offer_id = %offer.id,
            repriced = offer.product_ids.len(),
            "Offer created"
        );
        Ok(offer)
    }

    /// Deletes an offer and restores the baseline price of its products.
    pub async fn delete_and_restore(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM offers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Offer", id));
        }

        let restored = sqlx::query(
            r#"
            UPDATE products
            SET price_cents = original_price_cents,
                original_price_cents = NULL,
                updated_at = ?2
            WHERE original_price_cents IS NOT NULL
              AND id IN (SELECT product_id FROM offer_products WHERE offer_id = ?1)
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM offers WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(offer_id = %id, restored, "Offer deleted, prices restored");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Offer> {
        let row: Option<OfferRow> =
            sqlx::query_as(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let row = row.ok_or_else(|| DbError::not_found("Offer", id))?;
        let mut offers = self.attach_products(vec![row]).await?;
        offers.pop().ok_or_else(|| DbError::not_found("Offer", id))
    }

    /// Every offer, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<Offer>> {
        let rows: Vec<OfferRow> = sqlx::query_as(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_products(rows).await
    }

    /// Offers currently active at `now`, newest first.
    pub async fn list_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Offer>> {
        let rows: Vec<OfferRow> = sqlx::query_as(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE is_active = 1 ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let offers = self.attach_products(rows).await?;
        Ok(offers
            .into_iter()
            .filter(|offer| offer.is_currently_active(now))
            .collect())
    }

    /// Edits offer fields. Product prices are left as they are.
    pub async fn update(&self, id: &str, update: &OfferUpdate) -> DbResult<Offer> {
        let mut offer = self.get(id).await?;

        if let Some(title) = &update.title {
            offer.title = title.trim().to_string();
        }
        if let Some(description) = &update.description {
            offer.description = description.trim().to_string();
        }
        if update.min_order_cents.is_some() {
            offer.min_order_cents = update.min_order_cents;
        }
        if update.max_discount_cents.is_some() {
            offer.max_discount_cents = update.max_discount_cents;
        }
        if let Some(start) = update.start_date {
            offer.start_date = start;
        }
        if let Some(end) = update.end_date {
            offer.end_date = end;
        }
        if update.usage_limit.is_some() {
            offer.usage_limit = update.usage_limit;
        }
        if let Some(is_active) = update.is_active {
            offer.is_active = is_active;
        }
        offer.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE offers SET
                title = ?2,
                description = ?3,
                min_order_cents = ?4,
                max_discount_cents = ?5,
                start_date = ?6,
                end_date = ?7,
                usage_limit = ?8,
                is_active = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.title)
        .bind(&offer.description)
        .bind(offer.min_order_cents)
        .bind(offer.max_discount_cents)
        .bind(offer.start_date)
        .bind(offer.end_date)
        .bind(offer.usage_limit)
        .bind(offer.is_active)
        .bind(offer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(offer)
    }

    async fn attach_products(&self, rows: Vec<OfferRow>) -> DbResult<Vec<Offer>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT offer_id, product_id FROM offer_products WHERE offer_id IN (",
        );
        let mut separated = query.separated(", ");
        for row in &rows {
            separated.push_bind(row.id.clone());
        }
        separated.push_unseparated(") ORDER BY offer_id, rowid");

        let links: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut by_offer: HashMap<String, Vec<String>> = HashMap::new();
        for (offer_id, product_id) in links {
            by_offer.entry(offer_id).or_default().push(product_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let product_ids = by_offer.remove(&row.id).unwrap_or_default();
                row.into_offer(product_ids)
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use emporium_core::{NewProduct, ProductCategory};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let lamp = db
            .products()
            .insert(&NewProduct {
                name: "Lamp".to_string(),
                description: "Desk lamp".to_string(),
                price_cents: 1000,
                category: ProductCategory::Home,
                brand: None,
                images: vec![],
                stock: 3,
                tags: vec![],
            })
            .await
            .unwrap();
        (db, lamp.id)
    }

    fn new_offer(product_ids: Vec<String>, bps: i64) -> NewOffer {
        let now = Utc::now();
        NewOffer {
            title: "Festive".to_string(),
            description: String::new(),
            discount_type: DiscountType::Percentage,
            discount_value: bps,
            min_order_cents: None,
            max_discount_cents: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(7),
            usage_limit: None,
            is_active: true,
            product_ids,
        }
    }

    #[tokio::test]
    async fn test_create_then_delete_restores_price() {
        let (db, lamp) = setup().await;

        let offer = db
            .offers()
            .insert_with_repricing(&new_offer(vec![lamp.clone()], 1000))
            .await
            .unwrap();

        let discounted = db.products().get(&lamp).await.unwrap();
        assert_eq!(discounted.price_cents, 900);
        assert_eq!(discounted.original_price_cents, Some(1000));

        db.offers().delete_and_restore(&offer.id).await.unwrap();

        let restored = db.products().get(&lamp).await.unwrap();
        assert_eq!(restored.price_cents, 1000);
        assert_eq!(restored.original_price_cents, None);
        assert!(matches!(
            db.offers().get(&offer.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_offer_does_not_compound() {
        let (db, lamp) = setup().await;

        db.offers()
            .insert_with_repricing(&new_offer(vec![lamp.clone()], 1000))
            .await
            .unwrap();
        db.offers()
            .insert_with_repricing(&new_offer(vec![lamp.clone()], 2000))
            .await
            .unwrap();

        let product = db.products().get(&lamp).await.unwrap();
        assert_eq!(product.price_cents, 800);
        assert_eq!(product.original_price_cents, Some(1000));
    }

    #[tokio::test]
    async fn test_unknown_products_are_skipped() {
        let (db, lamp) = setup().await;

        let offer = db
            .offers()
            .insert_with_repricing(&new_offer(
                vec!["no-such-product".to_string(), lamp.clone(), lamp.clone()],
                1000,
            ))
            .await
            .unwrap();

        assert_eq!(offer.product_ids, vec![lamp.clone()]);
        assert_eq!(db.offers().get(&offer.id).await.unwrap().product_ids, vec![lamp]);
    }

    #[tokio::test]
    async fn test_active_listing_respects_window() {
        let (db, lamp) = setup().await;
        let now = Utc::now();

        let mut future = new_offer(vec![lamp.clone()], 500);
        future.start_date = now + Duration::days(1);
        future.end_date = now + Duration::days(2);
        db.offers().insert_with_repricing(&future).await.unwrap();

        let current = db
            .offers()
            .insert_with_repricing(&new_offer(vec![], 500))
            .await
            .unwrap();

        let active = db.offers().list_active(now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, current.id);
        assert_eq!(db.offers().list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_does_not_reprice() {
        let (db, lamp) = setup().await;
        let offer = db
            .offers()
            .insert_with_repricing(&new_offer(vec![lamp.clone()], 1000))
            .await
            .unwrap();

        let updated = db
            .offers()
            .update(
                &offer.id,
                &OfferUpdate {
                    title: Some("Clearance".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Clearance");
        assert!(!updated.is_active);
        assert_eq!(db.products().get(&lamp).await.unwrap().price_cents, 900);
    }
}
