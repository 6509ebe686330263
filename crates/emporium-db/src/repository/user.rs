//! # User Repository
//!
//! Customer and admin accounts.
//!
//! Emails are stored lowercase; callers normalise before lookup. The
//! password hash never leaves this crate inside [`User`]; it is only
//! exposed through [`UserCredentials`] for login and password checks.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use emporium_core::{PageRequest, Paginated, Role, ShippingAddress, User, UserStats};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, phone, address, \
     is_email_verified, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: Role,
    is_active: bool,
    phone: Option<String>,
    address: Option<Json<ShippingAddress>>,
    is_email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserCredentials {
    fn from(row: UserRow) -> Self {
        UserCredentials {
            password_hash: row.password_hash,
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                role: row.role,
                is_active: row.is_active,
                phone: row.phone,
                address: row.address.map(|json| json.0),
                is_email_verified: row.is_email_verified,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// A user together with the stored argon2 hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Profile columns a user may edit.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<ShippingAddress>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<UserCredentials>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(UserCredentials::from))
    }

    pub async fn credentials(&self, id: &str) -> DbResult<UserCredentials> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(UserCredentials::from)
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn get(&self, id: &str) -> DbResult<User> {
        Ok(self.credentials(id).await?.user)
    }

    /// Creates a verified customer, or verifies an existing unverified one.
    ///
    /// An existing row keeps its id, role and creation time.
    pub async fn upsert_verified(&self, name: &str, email: &str, password_hash: &str) -> DbResult<User> {
        let now = Utc::now();
        debug!(email = %email, "Upserting verified user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, is_active,
                is_email_verified, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, 1, ?6, ?6)
            ON CONFLICT (email) DO UPDATE SET
                name = excluded.name,
                password_hash = excluded.password_hash,
                is_active = 1,
                is_email_verified = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(generate_id())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Role::User)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_email(email)
            .await?
            .map(|credentials| credentials.user)
            .ok_or_else(|| DbError::not_found("User", email))
    }

    /// Creates or promotes the admin account for `email`.
    pub async fn upsert_admin(&self, name: &str, email: &str, password_hash: &str) -> DbResult<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, role, is_active,
                is_email_verified, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, 1, ?6, ?6)
            ON CONFLICT (email) DO UPDATE SET
                password_hash = excluded.password_hash,
                role = excluded.role,
                is_active = 1,
                is_email_verified = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(generate_id())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Role::Admin)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(email = %email, "Admin account ready");
        self.find_by_email(email)
            .await?
            .map(|credentials| credentials.user)
            .ok_or_else(|| DbError::not_found("User", email))
    }

    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    pub async fn update_profile(&self, id: &str, changes: &ProfileChanges) -> DbResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?2, name),
                phone = COALESCE(?3, phone),
                address = COALESCE(?4, address),
                password_hash = COALESCE(?5, password_hash),
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.phone)
        .bind(changes.address.as_ref().map(Json))
        .bind(&changes.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        self.get(id).await
    }

    /// Customer accounts (role user), newest first.
    pub async fn list_customers(&self, page: PageRequest) -> DbResult<Paginated<User>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?1")
            .bind(Role::User)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 \
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
        ))
        .bind(Role::User)
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(|row| UserCredentials::from(row).user)
            .collect();
        Ok(Paginated::new(users, total, page))
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<User> {
        let result = sqlx::query("UPDATE users SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(is_active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, is_active, "User status changed");
        self.get(id).await
    }

    /// Customer counters. `month_start` bounds "new this month".
    pub async fn stats(&self, month_start: DateTime<Utc>) -> DbResult<UserStats> {
        let (total_users, active_users, new_users_this_month): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN created_at >= ?2 THEN 1 ELSE 0 END), 0)
            FROM users
            WHERE role = ?1
            "#,
        )
        .bind(Role::User)
        .bind(month_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStats {
            total_users,
            active_users,
            blocked_users: total_users - active_users,
            new_users_this_month,
        })
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

    #[tokio::test]
    async fn test_upsert_verified_creates_then_updates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        let created = repo
            .upsert_verified("Asha", "asha@example.com", "hash-1")
            .await
            .unwrap();
        assert!(created.is_email_verified);
        assert_eq!(created.role, Role::User);

        let again = repo
            .upsert_verified("Asha R", "asha@example.com", "hash-2")
            .await
            .unwrap();
        assert_eq!(again.id, created.id);
        assert_eq!(again.name, "Asha R");

        let creds = repo.find_by_email("asha@example.com").await.unwrap().unwrap();
        assert_eq!(creds.password_hash.as_deref(), Some("hash-2"));
    }

    #[tokio::test]
    async fn test_admin_promotion() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        repo.upsert_verified("Ops", "ops@example.com", "h").await.unwrap();

        let admin = repo.upsert_admin("Ops", "ops@example.com", "h2").await.unwrap();
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_absent_fields() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        let user = repo.upsert_verified("Asha", "asha@example.com", "h").await.unwrap();

        let updated = repo
            .update_profile(
                &user.id,
                &ProfileChanges {
                    phone: Some("+91 90000 00000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.phone.as_deref(), Some("+91 90000 00000"));
        assert!(updated.address.is_none());
    }

    #[tokio::test]
    async fn test_stats_and_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        let a = repo.upsert_verified("A", "a@example.com", "h").await.unwrap();
        repo.upsert_verified("B", "b@example.com", "h").await.unwrap();
        repo.upsert_admin("Admin", "admin@example.com", "h").await.unwrap();

        repo.set_active(&a.id, false).await.unwrap();

        let stats = repo.stats(Utc::now() - Duration::days(1)).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.blocked_users, 1);
        assert_eq!(stats.new_users_this_month, 2);

        let page = repo.list_customers(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|u| !u.is_admin()));
    }
}
