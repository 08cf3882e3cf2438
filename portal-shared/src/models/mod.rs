/// Database models for the portal
///
/// Each model is a `sqlx::FromRow` struct with its CRUD operations as
/// associated async functions taking a `&PgPool`.
///
/// # Models
///
/// - `department`: Department enum, the tenant scope for users and projects
/// - `user`: Portal accounts with role and department
/// - `project`: Department projects tracked on the dashboards
/// - `contact`: Public contact-form submissions
///
/// # Example
///
/// ```no_run
/// use portal_shared::models::user::{CreateUser, User, UserRole};
/// use portal_shared::models::department::Department;
/// use portal_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: "Ada".to_string(),
///     role: UserRole::Staff,
///     department: Department::Accounts,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

pub mod contact;
pub mod department;
pub mod project;
pub mod user;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page/limit pagination as sent by the dashboards
///
/// Values are clamped rather than rejected: `page` below 1 becomes 1 and
/// `limit` is kept within `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }
    }

    /// Effective page number (1-based)
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Effective SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    /// Effective SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// One page of results with the total row count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,

    /// Number of pages needed for `total` rows
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let limit = pagination.limit();

        Self {
            items,
            total,
            page: pagination.page(),
            limit,
            total_pages: (total.max(0) + limit - 1) / limit,
        }
    }

    /// Converts the items, keeping the counts
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}
