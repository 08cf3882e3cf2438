/// Contact-form submissions
///
/// Submissions arrive through the public `POST /api/contact` endpoint and are
/// triaged by admins from the Admin dashboard.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE contact_status AS ENUM ('new', 'in_progress', 'resolved', 'archived');
///
/// CREATE TABLE contacts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL,
///     phone VARCHAR(50),
///     company VARCHAR(255),
///     subject VARCHAR(255),
///     message TEXT NOT NULL,
///     status contact_status NOT NULL DEFAULT 'new',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::Pagination;

const CONTACT_COLUMNS: &str =
    "id, name, email, phone, company, subject, message, status, created_at, updated_at";

/// Triage status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    InProgress,
    Resolved,
    Archived,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::InProgress => "in_progress",
            ContactStatus::Resolved => "resolved",
            ContactStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for storing a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

impl Contact {
    pub async fn create(pool: &PgPool, data: CreateContact) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO contacts (name, email, phone, company, subject, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CONTACT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(data.name)
            .bind(data.email)
            .bind(data.phone)
            .bind(data.company)
            .bind(data.subject)
            .bind(data.message)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");

        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists submissions, newest first, optionally by status
    pub async fn list(
        pool: &PgPool,
        status: Option<ContactStatus>,
        pagination: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE ($1::contact_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(status)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool, status: Option<ContactStatus>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM contacts WHERE ($1::contact_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Number of submissions per status, for the admin statistics
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(ContactStatus, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT status, COUNT(*) FROM contacts GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
    }

    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE contacts
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTACT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&ContactStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(ContactStatus::InProgress.as_str(), "in_progress");
        let status: ContactStatus = serde_json::from_str("\"resolved\"").unwrap();
        assert_eq!(status, ContactStatus::Resolved);
    }
}
