//! # Contact Repository
//!
//! Messages from the public contact form and their admin triage state.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use emporium_core::{
    ContactApplication, ContactFilter, ContactPriority, ContactStats, ContactStatus, ContactUpdate,
    NewContact, PageRequest, Paginated,
};

const CONTACT_COLUMNS: &str =
    "id, name, email, subject, message, status, priority, admin_notes, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ContactRow {
    id: String,
    name: String,
    email: String,
    subject: String,
    message: String,
    status: ContactStatus,
    priority: ContactPriority,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ContactRow> for ContactApplication {
    fn from(row: ContactRow) -> Self {
        ContactApplication {
            id: row.id,
            name: row.name,
            email: row.email,
            subject: row.subject,
            message: row.message,
            status: row.status,
            priority: row.priority,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ContactRepository { pool }
    }

    /// Stores a submission with status new and medium priority.
    ///
    /// `email` is the normalised address returned by validation.
    pub async fn insert(&self, contact: &NewContact, email: &str) -> DbResult<ContactApplication> {
        let now = Utc::now();
        let application = ContactApplication {
            id: generate_id(),
            name: contact.name.trim().to_string(),
            email: email.to_string(),
            subject: contact.subject.trim().to_string(),
            message: contact.message.trim().to_string(),
            status: ContactStatus::New,
            priority: ContactPriority::default(),
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO contact_applications (
                id, name, email, subject, message, status, priority,
                admin_notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&application.id)
        .bind(&application.name)
        .bind(&application.email)
        .bind(&application.subject)
        .bind(&application.message)
        .bind(application.status)
        .bind(application.priority)
        .bind(&application.admin_notes)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(contact_id = %application.id, "Contact application stored");
        Ok(application)
    }

    pub async fn list(&self, filter: ContactFilter, page: PageRequest) -> DbResult<Paginated<ContactApplication>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM contact_applications WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_applications WHERE 1 = 1"
        ));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ContactRow> = select.build_query_as().fetch_all(&self.pool).await?;
        Ok(Paginated::new(
            rows.into_iter().map(ContactApplication::from).collect(),
            total,
            page,
        ))
    }

    pub async fn get(&self, id: &str) -> DbResult<ContactApplication> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_applications WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContactApplication::from)
            .ok_or_else(|| DbError::not_found("Contact application", id))
    }

    /// Fetches an application for an admin, marking it read if it was new.
    pub async fn open(&self, id: &str) -> DbResult<ContactApplication> {
        sqlx::query(
            "UPDATE contact_applications SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(ContactStatus::Read)
        .bind(Utc::now())
        .bind(ContactStatus::New)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn update(&self, id: &str, update: &ContactUpdate) -> DbResult<ContactApplication> {
        let result = sqlx::query(
            r#"
            UPDATE contact_applications SET
                status = COALESCE(?2, status),
                priority = COALESCE(?3, priority),
                admin_notes = COALESCE(?4, admin_notes),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.priority)
        .bind(&update.admin_notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact application", id));
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM contact_applications WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Contact application", id));
        }
        Ok(())
    }

    pub async fn stats(&self) -> DbResult<ContactStats> {
        let (total, new, resolved, high_priority): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN priority = ?3 THEN 1 ELSE 0 END), 0)
            FROM contact_applications
            "#,
        )
        .bind(ContactStatus::New)
        .bind(ContactStatus::Resolved)
        .bind(ContactPriority::High)
        .fetch_one(&self.pool)
        .await?;

        Ok(ContactStats {
            total,
            new,
            resolved,
            high_priority,
        })
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: ContactFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        query.push(" AND priority = ").push_bind(priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn submission(subject: &str) -> NewContact {
        NewContact {
            name: "Ravi".to_string(),
            email: "Ravi@Example.com".to_string(),
            subject: subject.to_string(),
            message: "Where is my parcel?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_marks_new_as_read() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();
        let stored = repo
            .insert(&submission("Delivery"), "ravi@example.com")
            .await
            .unwrap();
        assert_eq!(stored.status, ContactStatus::New);

        let opened = repo.open(&stored.id).await.unwrap();
        assert_eq!(opened.status, ContactStatus::Read);

        repo.update(
            &stored.id,
            &ContactUpdate {
                status: Some(ContactStatus::Resolved),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Opening again leaves a resolved application alone
        assert_eq!(repo.open(&stored.id).await.unwrap().status, ContactStatus::Resolved);
    }

    #[tokio::test]
    async fn test_filters_and_stats() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.contacts();
        let a = repo.insert(&submission("A"), "ravi@example.com").await.unwrap();
        repo.insert(&submission("B"), "ravi@example.com").await.unwrap();

        repo.update(
            &a.id,
            &ContactUpdate {
                priority: Some(ContactPriority::High),
                admin_notes: Some("call back".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let high = repo
            .list(
                ContactFilter {
                    priority: Some(ContactPriority::High),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(high.total, 1);
        assert_eq!(high.items[0].admin_notes.as_deref(), Some("call back"));

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.new, 2);
        assert_eq!(stats.high_priority, 1);
        assert_eq!(stats.resolved, 0);

        repo.delete(&a.id).await.unwrap();
        assert!(matches!(repo.get(&a.id).await, Err(DbError::NotFound { .. })));
    }
}
