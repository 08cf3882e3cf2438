/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('admin', 'manager', 'staff');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'staff',
///     department department NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use portal_shared::models::user::User;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// if let Some(user) = User::find_by_email(&pool, "ada@example.com").await? {
///     println!("{} works in {}", user.name, user.department);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::department::Department;
use super::Pagination;

const USER_COLUMNS: &str = "id, email, password_hash, name, role, department, is_active, \
                            created_at, updated_at, last_login_at";

/// Portal role (Postgres enum `user_role`)
///
/// Hierarchy: Admin > Manager > Staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access across every department
    Admin,

    /// Manages users and projects of their own department
    Manager,

    /// Regular department member
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Staff => "staff",
        }
    }

    /// Whether this role is at least `required` in the hierarchy
    pub fn has_permission(&self, required: &UserRole) -> bool {
        self.level() >= required.level()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    fn level(&self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::Manager => 2,
            UserRole::Staff => 1,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A portal account
///
/// The password hash is never serialized into API responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Case-insensitive unique email (CITEXT)
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: String,

    pub role: UserRole,

    pub department: Department,

    /// Deactivated accounts cannot log in
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id hash, never plaintext
    pub password_hash: String,

    pub name: String,

    pub role: UserRole,

    pub department: Department,
}

/// Profile fields a user may change about themselves
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Filter for user listings
#[derive(Debug, Clone, Copy, Default)]
pub struct UserFilter {
    pub department: Option<Department>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl User {
    /// Creates a new user
    ///
    /// Fails with a unique violation on `users_email_key` when the email is
    /// already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, name, role, department)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.role)
            .bind(data.department)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email (case-insensitive via CITEXT)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists users matching `filter`, newest first
    pub async fn list(
        pool: &PgPool,
        filter: UserFilter,
        pagination: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::department IS NULL OR department = $1)
              AND ($2::user_role IS NULL OR role = $2)
              AND ($3::boolean IS NULL OR is_active = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(filter.department)
            .bind(filter.role)
            .bind(filter.is_active)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(pool)
            .await
    }

    /// Counts users matching `filter`
    pub async fn count(pool: &PgPool, filter: UserFilter) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::department IS NULL OR department = $1)
              AND ($2::user_role IS NULL OR role = $2)
              AND ($3::boolean IS NULL OR is_active = $3)
            "#,
        )
        .bind(filter.department)
        .bind(filter.role)
        .bind(filter.is_active)
        .fetch_one(pool)
        .await
    }

    /// Number of users in each department (departments without users omitted)
    pub async fn count_by_department(pool: &PgPool) -> Result<Vec<(Department, i64)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT department, COUNT(*)
            FROM users
            GROUP BY department
            ORDER BY department
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Updates profile fields, returning `None` if the user doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(data.email)
            .bind(data.name)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the stored password hash
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes role and department (admin operation)
    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
        department: Department,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET role = $2, department = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role)
            .bind(department)
            .fetch_optional(pool)
            .await
    }

    /// Activates or deactivates an account
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Permanently deletes a user
    ///
    /// Projects owned by the user keep existing with `owner_id` set to NULL.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
