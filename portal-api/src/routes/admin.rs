/// Admin endpoints (admin role required for every route)
///
/// - `GET    /api/admin/stats` - Counts for the admin dashboard
/// - `GET    /api/admin/users` - All users (`department`, `role`, `active`, `page`, `limit`)
/// - `PUT    /api/admin/users/:id/role` - Change role and department
/// - `PUT    /api/admin/users/:id/status` - Activate or deactivate
/// - `DELETE /api/admin/users/:id` - Delete a user
/// - `POST   /api/admin/notifications` - Push a notification to a room or everyone
///
/// Admins cannot change the role or status of, or delete, their own account.

use crate::{
    app::AppState,
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
    routes::users::ListUsersQuery,
};
use axum::{
    extract::{Path, Query, State},
    Extension,
};
use portal_shared::{
    auth::middleware::AuthContext,
    models::{
        contact::Contact,
        department::Department,
        project::Project,
        user::{User, UserFilter, UserRole},
        Page,
    },
    realtime::{HubStats, Notification, NotificationLevel, ServerEvent},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub by_department: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsByStatus {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub users: UserStats,
    pub projects: CountsByStatus,
    pub contacts: CountsByStatus,
    pub realtime: HubStats,
}

fn counts_by_status<K>(rows: Vec<(K, i64)>, name: impl Fn(&K) -> &'static str) -> CountsByStatus {
    let by_status: BTreeMap<String, i64> = rows
        .iter()
        .map(|(key, count)| (name(key).to_string(), *count))
        .collect();

    CountsByStatus {
        total: by_status.values().sum(),
        by_status,
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub role: UserRole,

    /// Unchanged when omitted
    pub department: Option<Department>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(alias = "is_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotificationRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Message must be 1 to 2000 characters"))]
    pub message: String,

    #[serde(default)]
    pub level: NotificationLevel,

    /// Target room; everyone when omitted
    pub room: Option<String>,

    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct NotificationDelivery {
    pub room: Option<String>,
    pub delivered: usize,
}

fn forbid_self(auth: &AuthContext, id: Uuid, action: &str) -> ApiResult<()> {
    if auth.user_id == id {
        return Err(ApiError::BadRequest(format!("You cannot {} your own account", action)));
    }
    Ok(())
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<ApiResponse<AdminStats>> {
    let by_department = User::count_by_department(&state.db).await?;
    let active = User::count(
        &state.db,
        UserFilter {
            is_active: Some(true),
            ..Default::default()
        },
    )
    .await?;

    let by_department: BTreeMap<String, i64> = by_department
        .into_iter()
        .map(|(department, count)| (department.as_str().to_string(), count))
        .collect();

    let users = UserStats {
        total: by_department.values().sum(),
        active,
        by_department,
    };

    let projects = counts_by_status(Project::count_by_status(&state.db).await?, |s| s.as_str());
    let contacts = counts_by_status(Contact::count_by_status(&state.db).await?, |s| s.as_str());

    Ok(ApiResponse::ok(AdminStats {
        users,
        projects,
        contacts,
        realtime: state.hub.stats().await,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<ApiResponse<Page<User>>> {
    let filter = UserFilter {
        department: query.department,
        role: query.role,
        is_active: query.active,
    };
    let pagination = query.pagination();

    let users = User::list(&state.db, filter, pagination).await?;
    let total = User::count(&state.db, filter).await?;

    Ok(ApiResponse::ok(Page::new(users, total, pagination)))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<User>> {
    forbid_self(&auth, id, "change the role of")?;

    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let department = req.department.unwrap_or(existing.department);
    let user = User::update_role(&state.db, id, req.role, department)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        user_id = %id,
        role = %user.role,
        department = %user.department,
        changed_by = %auth.user_id,
        "User role updated"
    );

    state
        .hub
        .emit_to_user(
            id,
            ServerEvent::Notification(Notification::new(
                "Role updated",
                format!("You are now {} in {}", user.role, user.department.display_name()),
            )),
        )
        .await;

    Ok(ApiResponse::with_message(user, "User role updated"))
}

pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<User>> {
    forbid_self(&auth, id, "change the status of")?;

    let user = User::set_active(&state.db, id, req.is_active)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, is_active = user.is_active, changed_by = %auth.user_id, "User status updated");

    let message = if user.is_active { "User activated" } else { "User deactivated" };
    Ok(ApiResponse::with_message(user, message))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    forbid_self(&auth, id, "delete")?;

    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "User deleted");

    Ok(ApiResponse::with_message((), "User deleted"))
}

pub async fn send_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<NotificationRequest>,
) -> ApiResult<ApiResponse<NotificationDelivery>> {
    let mut notification = Notification::new(req.title, req.message).with_level(req.level);
    if let Some(data) = req.data {
        notification = notification.with_data(data);
    }
    let event = ServerEvent::Notification(notification);

    let delivered = match req.room.as_deref() {
        Some(room) => state.hub.emit_to_room(room, event, None).await,
        None => state.hub.broadcast(event).await,
    };

    tracing::info!(room = ?req.room, delivered, sent_by = %auth.user_id, "Notification sent");

    Ok(ApiResponse::with_message(
        NotificationDelivery {
            room: req.room,
            delivered,
        },
        "Notification sent",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_shared::models::project::ProjectStatus;

    #[test]
    fn test_counts_by_status() {
        let counts = counts_by_status(
            vec![(ProjectStatus::Active, 3), (ProjectStatus::OnHold, 2)],
            |s| s.as_str(),
        );

        assert_eq!(counts.total, 5);
        assert_eq!(counts.by_status.get("on_hold"), Some(&2));
    }

    #[test]
    fn test_forbid_self() {
        let auth = AuthContext::new(Uuid::new_v4(), UserRole::Admin, Department::Admin);
        assert!(forbid_self(&auth, auth.user_id, "delete").is_err());
        assert!(forbid_self(&auth, Uuid::new_v4(), "delete").is_ok());
    }

    #[test]
    fn test_notification_request_defaults() {
        let req: NotificationRequest = serde_json::from_value(serde_json::json!({
            "title": "Maintenance",
            "message": "Portal restarts at 18:00"
        }))
        .unwrap();

        assert_eq!(req.level, NotificationLevel::Info);
        assert!(req.room.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_status_request_accepts_both_casings() {
        let camel: UpdateStatusRequest =
            serde_json::from_value(serde_json::json!({ "isActive": false })).unwrap();
        let snake: UpdateStatusRequest =
            serde_json::from_value(serde_json::json!({ "is_active": true })).unwrap();

        assert!(!camel.is_active);
        assert!(snake.is_active);
    }
}
