/// Bearer-token authentication for Axum
///
/// [`authenticate`] turns an `Authorization: Bearer <token>` header into an
/// [`AuthContext`]; [`jwt_auth_middleware`] runs it and stores the context in
/// the request extensions so handlers can take `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use portal_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     format!("{} ({})", auth.user_id, auth.role)
/// }
///
/// let secret = "a-secret-that-is-at-least-32-bytes!".to_string();
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(move |req, next| {
///         jwt_auth_middleware(secret.clone(), req, next)
///     }));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};
use crate::models::{department::Department, user::UserRole};

/// Identity of the caller, added to request extensions after authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
    pub department: Department,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: UserRole, department: Department) -> Self {
        Self {
            user_id,
            role,
            department,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&Claims> for AuthContext {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.user_id, claims.role, claims.department)
    }
}

/// Error type for authentication
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Extracts the raw token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat("Empty bearer token".to_string()));
    }

    Ok(token)
}

/// Validates the bearer token in `headers` and builds the caller's context
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;

    Ok(AuthContext::from(&claims))
}

/// JWT authentication middleware
///
/// Rejects the request with 401/400 when the header is missing, malformed or
/// carries an invalid token.
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_context = authenticate(req.headers(), &secret)?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, TokenType};
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_authenticate_valid_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, UserRole::Staff, Department::Secretariat, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        let auth = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(auth, AuthContext::new(user_id, UserRole::Staff, Department::Secretariat));
        assert!(!auth.is_admin());
    }

    #[test]
    fn test_authenticate_missing_header() {
        assert_eq!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn test_authenticate_wrong_scheme() {
        assert!(matches!(
            authenticate(&headers_with("Basic dXNlcjpwYXNz"), SECRET),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(
            authenticate(&headers_with("Bearer   "), SECRET),
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::Admin, Department::Admin, TokenType::Refresh);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            authenticate(&headers_with(&format!("Bearer {}", token)), SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("x".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidToken("x".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
