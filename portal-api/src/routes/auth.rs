/// Authentication endpoints
///
/// - `POST /api/auth/register` - Create a staff account and sign in
/// - `POST /api/auth/login` - Exchange credentials for tokens
/// - `POST /api/auth/refresh` - Exchange a refresh token for a new pair
/// - `GET  /api/auth/me` - Current account (bearer token)
///
/// Register, login and refresh are rate limited per client.

use crate::{
    app::AppState,
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
};
use axum::{extract::State, http::StatusCode, Extension};
use portal_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password,
    },
    models::{
        department::Department,
        user::{CreateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength is checked separately, see `password::validate_password_strength`
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    pub department: Department,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Tokens plus the signed-in account
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,

    pub user: User,
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    Ok(jwt::issue_token_pair(
        user.id,
        user.role,
        user.department,
        state.config.access_token_ttl(),
        state.jwt_secret(),
    )?)
}

/// Registers a new account
///
/// Self-registered accounts are always `staff`; roles are granted by admins.
///
/// # Errors
///
/// - `400 Bad Request`: missing or invalid fields, weak password, admin department
/// - `409 Conflict`: email already registered
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, ApiResponse<AuthResponse>)> {
    password::validate_password_strength(&req.password)?;

    if req.department == Department::Admin {
        return Err(ApiError::invalid_field(
            "department",
            "The admin department cannot be chosen at registration",
        ));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name.trim().to_string(),
            role: UserRole::Staff,
            department: req.department,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, department = %user.department, "User registered");

    let tokens = issue_tokens(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(AuthResponse { tokens, user }, "Registration successful"),
    ))
}

/// Signs in with email and password
///
/// # Errors
///
/// - `400 Bad Request`: missing email or password
/// - `401 Unauthorized`: unknown email or wrong password
/// - `403 Forbidden`: account deactivated
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let Some(mut user) = User::find_by_email(&state.db, req.email.trim()).await? else {
        password::verify_dummy(&req.password);
        return Err(invalid());
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;
    user.last_login_at = Some(chrono::Utc::now());

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    let tokens = issue_tokens(&state, &user)?;
    Ok(ApiResponse::with_message(AuthResponse { tokens, user }, "Login successful"))
}

/// Issues a fresh token pair from a refresh token
///
/// Role and department are re-read from the database, so changes made by an
/// admin take effect at the next refresh.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> ApiResult<ApiResponse<TokenPair>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    Ok(ApiResponse::ok(issue_tokens(&state, &user)?))
}

/// Current account
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "email": "not-an-email",
            "password": "Welcome2Portal",
            "name": "",
            "department": "hr"
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("name"));
    }

    #[test]
    fn test_register_request_rejects_unknown_department() {
        let result = serde_json::from_value::<RegisterRequest>(json!({
            "email": "ada@example.com",
            "password": "Welcome2Portal",
            "name": "Ada",
            "department": "marketing"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_login_request_requires_password() {
        let req: LoginRequest =
            serde_json::from_value(json!({ "email": "ada@example.com", "password": "" })).unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("password"));
    }

    #[test]
    fn test_refresh_request_accepts_both_spellings() {
        for body in [json!({ "refreshToken": "abc" }), json!({ "refresh_token": "abc" })] {
            let req: RefreshRequest = serde_json::from_value(body).unwrap();
            assert_eq!(req.refresh_token, "abc");
        }
    }
}
