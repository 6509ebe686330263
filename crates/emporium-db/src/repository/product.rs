//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - Filtered, sorted, paginated listing
//! - Admin CRUD with soft delete
//! - Batch lookup for checkout pricing
//!
//! ## Listing Query
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /api/products?category=home&search=lamp&sortBy=price&sortOrder=asc │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT ... FROM products WHERE 1 = 1                                   │
//! │     AND is_active = 1                (unless admin listing)             │
//! │     AND category = ?                                                    │
//! │     AND (name LIKE ? OR description LIKE ?)   (ASCII case-insensitive)  │
//! │  ORDER BY price_cents ASC, id                                           │
//! │  LIMIT ? OFFSET ?                                                       │
//! │                                                                         │
//! │  Same WHERE clause feeds the COUNT(*) for the page totals.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use emporium_core::{
    NewProduct, PageRequest, Paginated, Product, ProductCategory, ProductFilter, ProductSort,
    ProductUpdate, SortOrder,
};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, original_price_cents, \
     category, brand, images, stock, is_active, rating, num_reviews, tags, created_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct ProductRow {
    id: String,
    name: String,
    description: String,
    price_cents: i64,
    original_price_cents: Option<i64>,
    category: ProductCategory,
    brand: Option<String>,
    images: Json<Vec<String>>,
    stock: i64,
    is_active: bool,
    rating: f64,
    num_reviews: i64,
    tags: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            original_price_cents: row.original_price_cents,
            category: row.category,
            brand: row.brand,
            images: row.images.0,
            stock: row.stock,
            is_active: row.is_active,
            rating: row.rating,
            num_reviews: row.num_reviews,
            tags: row.tags.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products matching `filter`, one page at a time.
    ///
    /// Inactive products are only included when `filter.include_inactive`
    /// is set (admin listing).
    pub async fn list(&self, filter: &ProductFilter, page: PageRequest) -> DbResult<Paginated<Product>> {
        debug!(
            category = ?filter.category,
            search = ?filter.search,
            page = page.page,
            "Listing products"
        );

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"
        ));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(sort_column(filter.sort_by))
            .push(match filter.sort_order {
                SortOrder::Asc => " ASC",
                SortOrder::Desc => " DESC",
            })
            .push(", id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;

        debug!(count = rows.len(), total, "Listing returned products");
        Ok(Paginated::new(
            rows.into_iter().map(Product::from).collect(),
            total,
            page,
        ))
    }

    /// Gets a product by id regardless of its active flag.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Product::from)
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product visible on the storefront. Inactive is reported as not found.
    pub async fn get_active(&self, id: &str) -> DbResult<Product> {
        let product = self.get(id).await?;
        if !product.is_active {
            return Err(DbError::not_found("Product", id));
        }
        Ok(product)
    }

    /// Loads every product whose id is in `ids`. Unknown ids are absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Inserts a new, active product.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            name: new.name.trim().to_string(),
            description: new.description.trim().to_string(),
            price_cents: new.price_cents,
            original_price_cents: None,
            category: new.category,
            brand: new.brand.clone(),
            images: new.images.clone(),
            stock: new.stock,
            is_active: true,
            rating: 0.0,
            num_reviews: 0,
            tags: new.tags.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price_cents, original_price_cents,
                category, brand, images, stock, is_active,
                rating, num_reviews, tags, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.original_price_cents)
        .bind(product.category)
        .bind(&product.brand)
        .bind(Json(&product.images))
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(Json(&product.tags))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Applies a partial update and returns the stored product.
    ///
    /// Setting `price_cents` explicitly makes it the new baseline: any
    /// offer-captured `original_price_cents` is cleared.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        let mut product = self.get(id).await?;

        if let Some(name) = &update.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &update.description {
            product.description = description.trim().to_string();
        }
        if let Some(price_cents) = update.price_cents {
            product.price_cents = price_cents;
            product.original_price_cents = None;
        }
        if let Some(category) = update.category {
            product.category = category;
        }
        if let Some(brand) = &update.brand {
            product.brand = Some(brand.clone());
        }
        if let Some(images) = &update.images {
            product.images = images.clone();
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        if let Some(is_active) = update.is_active {
            product.is_active = is_active;
        }
        if let Some(rating) = update.rating {
            product.rating = rating;
        }
        if let Some(tags) = &update.tags {
            product.tags = tags.clone();
        }
        product.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                price_cents = ?4,
                original_price_cents = ?5,
                category = ?6,
                brand = ?7,
                images = ?8,
                stock = ?9,
                is_active = ?10,
                rating = ?11,
                tags = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.original_price_cents)
        .bind(product.category)
        .bind(&product.brand)
        .bind(Json(&product.images))
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.rating)
        .bind(Json(&product.tags))
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(product)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Past orders keep referencing the row.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    if !filter.include_inactive {
        query.push(" AND is_active = 1");
    }

    if let Some(category) = filter.category {
        query.push(" AND category = ").push_bind(category);
    }

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = like_pattern(search);
        query
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn sort_column(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::CreatedAt => "created_at",
        ProductSort::Price => "price_cents",
        ProductSort::Name => "name",
        ProductSort::Rating => "rating",
    }
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn new_product(name: &str, price_cents: i64, category: ProductCategory) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            price_cents,
            category,
            brand: None,
            images: vec![format!("https://img.example/{name}.jpg")],
            stock: 10,
            tags: vec![],
        }
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.insert(&new_product("Desk Lamp", 1500, ProductCategory::Home))
            .await
            .unwrap();
        repo.insert(&new_product("Floor Lamp", 4500, ProductCategory::Home))
            .await
            .unwrap();
        repo.insert(&new_product("Novel", 800, ProductCategory::Books))
            .await
            .unwrap();
        db
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db
            .products()
            .insert(&new_product("Lamp", 1000, ProductCategory::Home))
            .await
            .unwrap();

        let fetched = db.products().get(&created.id).await.unwrap();
        assert_eq!(fetched.name, "Lamp");
        assert_eq!(fetched.images, vec!["https://img.example/Lamp.jpg".to_string()]);
        assert!(fetched.original_price_cents.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let db = seeded().await;
        let filter = ProductFilter {
            category: Some(ProductCategory::Home),
            sort_by: ProductSort::Price,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };

        let page = db
            .products()
            .list(&filter, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Desk Lamp");
        assert_eq!(page.items[1].name, "Floor Lamp");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let db = seeded().await;
        let filter = ProductFilter {
            search: Some("LAMP".to_string()),
            ..Default::default()
        };

        let page = db
            .products()
            .list(&filter, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_pagination() {
        let db = seeded().await;
        let page = db
            .products()
            .list(&ProductFilter::default(), PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_storefront() {
        let db = seeded().await;
        let repo = db.products();
        let all = repo
            .list(&ProductFilter::default(), PageRequest::default())
            .await
            .unwrap();
        let victim = all.items[0].id.clone();

        repo.soft_delete(&victim).await.unwrap();

        assert!(matches!(
            repo.get_active(&victim).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(!repo.get(&victim).await.unwrap().is_active);
        assert_eq!(repo.count().await.unwrap(), 2);

        let admin = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert_eq!(repo.list(&admin, PageRequest::default()).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_update_price_resets_baseline() {
        let db = seeded().await;
        let repo = db.products();
        let product = repo
            .list(&ProductFilter::default(), PageRequest::default())
            .await
            .unwrap()
            .items
            .remove(0);

        sqlx::query("UPDATE products SET original_price_cents = price_cents + 100 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let updated = repo
            .update(
                &product.id,
                &ProductUpdate {
                    price_cents: Some(2000),
                    stock: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price_cents, 2000);
        assert_eq!(updated.stock, 3);
        assert!(updated.original_price_cents.is_none());
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown() {
        let db = seeded().await;
        let repo = db.products();
        let known = repo
            .list(&ProductFilter::default(), PageRequest::default())
            .await
            .unwrap()
            .items[0]
            .id
            .clone();

        let found = repo
            .get_many(&[known.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, known);
    }
}
