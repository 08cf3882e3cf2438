/// Project endpoints (bearer token required)
///
/// - `GET    /api/projects` - List projects (`status`, `department`, `owner`, `page`, `limit`)
/// - `POST   /api/projects` - Create a project
/// - `GET    /api/projects/:id` - One project
/// - `PUT    /api/projects/:id` - Partial update
/// - `DELETE /api/projects/:id` - Delete
///
/// Reads are scoped to the caller's department (admins see all). Writes need
/// a manager of the project's department, or an admin. Every write pushes a
/// `notification` to the `department:<name>` room.
///
/// Responses carry the stored project plus a computed `overdue` flag.

use crate::{
    app::AppState,
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
};
use chrono::{NaiveDate, Utc};
use portal_shared::{
    auth::{authorization, middleware::AuthContext},
    models::{
        department::Department,
        project::{CreateProject, Project, ProjectFilter, ProjectPriority, ProjectStatus, UpdateProject},
        Page, Pagination, DEFAULT_PAGE_SIZE,
    },
    realtime::{Notification, ServerEvent},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Project as returned to the dashboards
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,

    /// Past its due date and still open
    pub overdue: bool,
}

impl ProjectResponse {
    pub fn at(project: Project, today: NaiveDate) -> Self {
        let overdue = project.is_overdue(today);
        Self { project, overdue }
    }
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self::at(project, Utc::now().date_naive())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub department: Option<Department>,
    pub status: Option<ProjectStatus>,
    pub owner: Option<Uuid>,
}

impl ListProjectsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    /// Defaults to the caller's department
    pub department: Option<Department>,

    pub status: Option<ProjectStatus>,

    pub priority: Option<ProjectPriority>,

    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i16>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_cents: Option<i64>,

    pub start_date: Option<NaiveDate>,

    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub status: Option<ProjectStatus>,

    pub priority: Option<ProjectPriority>,

    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i16>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget_cents: Option<i64>,

    pub start_date: Option<NaiveDate>,

    pub due_date: Option<NaiveDate>,
}

impl From<UpdateProjectRequest> for UpdateProject {
    fn from(req: UpdateProjectRequest) -> Self {
        UpdateProject {
            name: req.name.map(|name| name.trim().to_string()),
            description: req.description,
            status: req.status,
            priority: req.priority,
            progress: req.progress,
            budget_cents: req.budget_cents,
            start_date: req.start_date,
            due_date: req.due_date,
        }
    }
}

/// Rejects a due date before the start date
fn check_dates(start: Option<NaiveDate>, due: Option<NaiveDate>) -> ApiResult<()> {
    match (start, due) {
        (Some(start), Some(due)) if due < start => Err(ApiError::invalid_field(
            "due_date",
            "Due date cannot be before the start date",
        )),
        _ => Ok(()),
    }
}

async fn notify_department(state: &AppState, project: &Project, action: &str, actor: Uuid) {
    let notification = Notification::new(
        format!("Project {}", action),
        format!("{} was {}", project.name, action),
    )
    .with_data(json!({
        "projectId": project.id,
        "action": action,
        "by": actor,
    }));

    state
        .hub
        .emit_to_room(
            &project.department.room(),
            ServerEvent::Notification(notification),
            None,
        )
        .await;
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<ApiResponse<Page<ProjectResponse>>> {
    let filter = ProjectFilter {
        department: authorization::scoped_department(&auth, query.department)?,
        status: query.status,
        owner_id: query.owner,
    };
    let pagination = query.pagination();

    let projects = Project::list(&state.db, filter, pagination).await?;
    let total = Project::count(&state.db, filter).await?;

    let today = Utc::now().date_naive();
    Ok(ApiResponse::ok(
        Page::new(projects, total, pagination).map(|project| ProjectResponse::at(project, today)),
    ))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, ApiResponse<ProjectResponse>)> {
    let department = req.department.unwrap_or(auth.department);
    authorization::require_department_write(&auth, department)?;
    check_dates(req.start_date, req.due_date)?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: req.name.trim().to_string(),
            description: req.description,
            department,
            status: req.status.unwrap_or(ProjectStatus::Planning),
            priority: req.priority.unwrap_or_default(),
            progress: req.progress.unwrap_or(0),
            budget_cents: req.budget_cents,
            start_date: req.start_date,
            due_date: req.due_date,
            owner_id: Some(auth.user_id),
        },
    )
    .await?;

    tracing::info!(
        project_id = %project.id,
        department = %project.department,
        created_by = %auth.user_id,
        "Project created"
    );
    notify_department(&state, &project, "created", auth.user_id).await;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(ProjectResponse::from(project), "Project created"),
    ))
}

async fn load_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<ProjectResponse>> {
    let project = load_project(&state, id).await?;
    authorization::require_department_access(&auth, project.department)?;

    Ok(ApiResponse::ok(ProjectResponse::from(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProjectRequest>,
) -> ApiResult<ApiResponse<ProjectResponse>> {
    let existing = load_project(&state, id).await?;
    authorization::require_department_write(&auth, existing.department)?;

    let update = UpdateProject::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    check_dates(
        update.start_date.or(existing.start_date),
        update.due_date.or(existing.due_date),
    )?;

    let project = Project::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    tracing::info!(project_id = %project.id, updated_by = %auth.user_id, "Project updated");
    notify_department(&state, &project, "updated", auth.user_id).await;

    Ok(ApiResponse::with_message(ProjectResponse::from(project), "Project updated"))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    let project = load_project(&state, id).await?;
    authorization::require_department_write(&auth, project.department)?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    tracing::info!(project_id = %id, deleted_by = %auth.user_id, "Project deleted");
    notify_department(&state, &project, "deleted", auth.user_id).await;

    Ok(ApiResponse::with_message((), "Project deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_check_dates() {
        assert!(check_dates(date(2025, 1, 1), date(2025, 2, 1)).is_ok());
        assert!(check_dates(date(2025, 1, 1), date(2025, 1, 1)).is_ok());
        assert!(check_dates(None, date(2025, 1, 1)).is_ok());
        assert!(check_dates(date(2025, 2, 1), date(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateProjectRequest = serde_json::from_value(json!({
            "name": "Website relaunch",
            "progress": 120,
            "budget_cents": -5
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("progress"));
        assert!(fields.contains_key("budget_cents"));
        assert!(!fields.contains_key("name"));
    }

    #[test]
    fn test_create_request_requires_name() {
        let result = serde_json::from_value::<CreateProjectRequest>(json!({ "progress": 10 }));
        assert!(result.is_err());
    }

    fn project(status: ProjectStatus, due_date: Option<NaiveDate>) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: "Payroll migration".to_string(),
            description: None,
            department: Department::Accounts,
            status,
            priority: ProjectPriority::High,
            progress: 40,
            budget_cents: None,
            start_date: None,
            due_date,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_project_response_flags_overdue() {
        let today = date(2025, 3, 10).unwrap();

        let late = ProjectResponse::at(project(ProjectStatus::Active, date(2025, 3, 1)), today);
        let json = serde_json::to_value(&late).unwrap();
        assert_eq!(json["overdue"], true);
        assert_eq!(json["name"], "Payroll migration");
        assert_eq!(json["department"], "accounts");

        let done = ProjectResponse::at(project(ProjectStatus::Completed, date(2025, 3, 1)), today);
        assert!(!done.overdue);

        let due_today = ProjectResponse::at(project(ProjectStatus::Active, date(2025, 3, 10)), today);
        assert!(!due_today.overdue);

        assert!(!ProjectResponse::at(project(ProjectStatus::Planning, None), today).overdue);
    }

    #[test]
    fn test_update_request_conversion() {
        let req: UpdateProjectRequest = serde_json::from_value(json!({
            "name": "  Renamed  ",
            "status": "on_hold"
        }))
        .unwrap();

        let update = UpdateProject::from(req);
        assert_eq!(update.name.as_deref(), Some("Renamed"));
        assert_eq!(update.status, Some(ProjectStatus::OnHold));
        assert!(update.progress.is_none());
    }
}
