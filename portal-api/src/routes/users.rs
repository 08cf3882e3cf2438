/// User endpoints (bearer token required)
///
/// - `GET /api/users` - List users (managers: own department, admins: any)
/// - `GET /api/users/me` - Current account
/// - `PUT /api/users/me/password` - Change own password
/// - `GET /api/users/:id` - One user (self, admin, or manager of the same department)
/// - `PUT /api/users/:id` - Update name/email (self or admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, Query, State},
    Extension,
};
use portal_shared::{
    auth::{authorization, middleware::AuthContext, password},
    models::{
        department::Department,
        user::{UpdateUser, User, UserFilter, UserRole},
        Page, Pagination, DEFAULT_PAGE_SIZE,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Query string of user listings
///
/// Kept flat: `serde(flatten)` breaks number parsing in query strings.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub department: Option<Department>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

impl ListUsersQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<ApiResponse<Page<User>>> {
    authorization::require_role(&auth, UserRole::Manager)?;

    let filter = UserFilter {
        department: authorization::scoped_department(&auth, query.department)?,
        role: query.role,
        is_active: query.active,
    };
    let pagination = query.pagination();

    let users = User::list(&state.db, filter, pagination).await?;
    let total = User::count(&state.db, filter).await?;

    Ok(ApiResponse::ok(Page::new(users, total, pagination)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<User>> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if auth.user_id != user.id {
        authorization::require_role(&auth, UserRole::Manager)?;
        authorization::require_department_access(&auth, user.department)?;
    }

    Ok(ApiResponse::ok(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<ApiResponse<User>> {
    authorization::require_self_or_admin(&auth, id)?;

    let update = UpdateUser {
        email: req.email.map(|email| email.trim().to_string()),
        name: req.name.map(|name| name.trim().to_string()),
    };
    if update.email.is_none() && update.name.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, updated_by = %auth.user_id, "User profile updated");

    Ok(ApiResponse::with_message(user, "Profile updated"))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::invalid_field(
            "currentPassword",
            "Current password is incorrect",
        ));
    }

    password::validate_password_strength(&req.new_password)
        .map_err(|e| ApiError::invalid_field("newPassword", e.to_string()))?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(ApiResponse::with_message((), "Password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_pagination() {
        let query: ListUsersQuery =
            parse_query("page=3&limit=500&department=hr&active=true");

        assert_eq!(query.department, Some(Department::Hr));
        assert_eq!(query.active, Some(true));

        let pagination = query.pagination();
        assert_eq!(pagination.page(), 3);
        assert_eq!(pagination.limit(), 100);

        let pagination = ListUsersQuery::default().pagination();
        assert_eq!(pagination.limit(), DEFAULT_PAGE_SIZE);
    }

    fn parse_query(raw: &str) -> ListUsersQuery {
        let uri: axum::http::Uri = format!("/api/users?{raw}").parse().unwrap();
        Query::<ListUsersQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_update_request_validation() {
        let req = UpdateUserRequest {
            email: Some("not-an-email".to_string()),
            name: None,
        };
        assert!(req.validate().is_err());

        let req = UpdateUserRequest {
            email: None,
            name: Some("Grace".to_string()),
        };
        assert!(req.validate().is_ok());
    }
}
