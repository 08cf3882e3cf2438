/// Project model and database operations
///
/// Projects belong to a department and are what the Project Management and
/// department dashboards list and track.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     department department NOT NULL,
///     status project_status NOT NULL DEFAULT 'planning',
///     priority project_priority NOT NULL DEFAULT 'medium',
///     progress SMALLINT NOT NULL DEFAULT 0,       -- 0..=100
///     budget_cents BIGINT,                        -- >= 0
///     start_date DATE,
///     due_date DATE,                              -- >= start_date
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::department::Department;
use super::Pagination;

const PROJECT_COLUMNS: &str = "id, name, description, department, status, priority, progress, \
                               budget_cents, start_date, due_date, owner_id, created_at, updated_at";

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    /// Completed or cancelled; closed projects are never overdue
    pub fn is_closed(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }
}

/// Project priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for ProjectPriority {
    fn default() -> Self {
        ProjectPriority::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub department: Department,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,

    /// Completion percentage, 0..=100
    pub progress: i16,

    /// Budget in cents
    pub budget_cents: Option<i64>,

    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,

    /// Creating user; NULL once that user is deleted
    pub owner_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Whether the project is past its due date and still open
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_closed() && self.due_date.is_some_and(|due| due < today)
    }
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub department: Department,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub progress: i16,
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    pub progress: Option<i16>,
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateProject {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.progress.is_none()
            && self.budget_cents.is_none()
            && self.start_date.is_none()
            && self.due_date.is_none()
    }
}

/// Filter for project listings
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectFilter {
    pub department: Option<Department>,
    pub status: Option<ProjectStatus>,
    pub owner_id: Option<Uuid>,
}

impl ProjectFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(department) = self.department {
            builder.push(" AND department = ").push_bind(department);
        }
        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(owner_id) = self.owner_id {
            builder.push(" AND owner_id = ").push_bind(owner_id);
        }
    }
}

impl Project {
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO projects (name, description, department, status, priority, progress,
                                  budget_cents, start_date, due_date, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROJECT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.department)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.progress)
            .bind(data.budget_cents)
            .bind(data.start_date)
            .bind(data.due_date)
            .bind(data.owner_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists projects matching `filter`, newest first
    pub async fn list(
        pool: &PgPool,
        filter: ProjectFilter,
        pagination: Pagination,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects"));
        filter.push_where(&mut builder);
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        builder.build_query_as::<Project>().fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, filter: ProjectFilter) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects");
        filter.push_where(&mut builder);

        builder.build_query_scalar::<i64>().fetch_one(pool).await
    }

    /// Number of projects per status (statuses without projects omitted)
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(ProjectStatus, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT status, COUNT(*) FROM projects GROUP BY status ORDER BY status")
            .fetch_all(pool)
            .await
    }

    /// Applies a partial update, returning `None` if the project doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE projects SET updated_at = NOW()");

        if let Some(name) = data.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(status) = data.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        if let Some(progress) = data.progress {
            builder.push(", progress = ").push_bind(progress);
        }
        if let Some(budget_cents) = data.budget_cents {
            builder.push(", budget_cents = ").push_bind(budget_cents);
        }
        if let Some(start_date) = data.start_date {
            builder.push(", start_date = ").push_bind(start_date);
        }
        if let Some(due_date) = data.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {PROJECT_COLUMNS}"));

        builder.build_query_as::<Project>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
