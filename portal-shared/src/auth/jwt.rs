/// JWT token generation and validation
///
/// Tokens are signed with HS256. The payload carries the user id (`userId`),
/// the role and the department so that most requests can be authorized
/// without a database round trip.
///
/// # Token Types
///
/// - **Access Token**: 24 hours by default, sent as `Authorization: Bearer <token>`
/// - **Refresh Token**: 7 days, exchanged at `/api/auth/refresh`
///
/// # Example
///
/// ```
/// use portal_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use portal_shared::models::{department::Department, user::UserRole};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, UserRole::Admin, Department::Admin, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key")?;
/// assert_eq!(validated.user_id, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{department::Department, user::UserRole};

/// Value of the `iss` claim
pub const ISSUER: &str = "business-portal";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    /// Access token presented where a refresh token is required, or vice versa
    #[error("Wrong token type: expected {expected:?}, got {actual:?}")]
    WrongTokenType { expected: TokenType, actual: TokenType },

    #[error("Invalid token issuer")]
    InvalidIssuer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(7),
        }
    }
}

/// JWT claims
///
/// `userId` and `role` are the fields the dashboards read; `department` is
/// the tenant scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,

    pub role: UserRole,

    pub department: Department,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims with the default lifetime for `token_type`
    pub fn new(user_id: Uuid, role: UserRole, department: Department, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, role, department, token_type, token_type.default_expiration())
    }

    /// Creates claims expiring `expires_in` from now
    pub fn with_expiration(
        user_id: Uuid,
        role: UserRole,
        department: Department,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            user_id,
            role,
            department,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, `None` once expired
    pub fn expires_in_seconds(&self) -> Option<i64> {
        let remaining = self.exp - Utc::now().timestamp();
        (remaining > 0).then_some(remaining)
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, not-before and issuer, then returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        })
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected,
            actual: claims.token_type,
        });
    }

    Ok(claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates a token and requires it to be a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Access and refresh token pair issued at login/registration
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub token: String,

    #[serde(rename = "refreshToken")]
    pub refresh_token: String,

    /// Access token lifetime in seconds
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

/// Issues an access/refresh pair for a user
///
/// `access_ttl` overrides the default access-token lifetime.
pub fn issue_token_pair(
    user_id: Uuid,
    role: UserRole,
    department: Department,
    access_ttl: Duration,
    secret: &str,
) -> Result<TokenPair, JwtError> {
    let access = Claims::with_expiration(user_id, role, department, TokenType::Access, access_ttl);
    let refresh = Claims::new(user_id, role, department, TokenType::Refresh);

    Ok(TokenPair {
        token: create_token(&access, secret)?,
        refresh_token: create_token(&refresh, secret)?,
        expires_in: access_ttl.num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn access_claims() -> Claims {
        Claims::new(Uuid::new_v4(), UserRole::Manager, Department::Hr, TokenType::Access)
    }

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(7));
    }

    #[test]
    fn test_claims_payload_shape() {
        let claims = access_claims();
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["userId"], claims.user_id.to_string());
        assert_eq!(json["role"], "manager");
        assert_eq!(json["department"], "hr");
        assert_eq!(json["token_type"], "access");
        assert_eq!(json["iss"], ISSUER);
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = access_claims();
        let token = create_token(&claims, SECRET).unwrap();

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.user_id, claims.user_id);
        assert_eq!(validated.role, UserRole::Manager);
        assert_eq!(validated.department, Department::Hr);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&access_claims(), SECRET).unwrap();
        assert!(validate_token(&token, "another-secret-key-at-least-32-bytes").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            UserRole::Staff,
            Department::Accounts,
            TokenType::Access,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());
        assert!(claims.expires_in_seconds().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_garbage_token() {
        assert!(matches!(
            validate_token("not.a.token", SECRET),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_token_type_enforced() {
        let access = create_token(&access_claims(), SECRET).unwrap();
        let refresh = create_token(
            &Claims::new(Uuid::new_v4(), UserRole::Staff, Department::Hr, TokenType::Refresh),
            SECRET,
        )
        .unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongTokenType { expected: TokenType::Access, .. })
        ));
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }

    #[test]
    fn test_issue_token_pair() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(
            user_id,
            UserRole::Admin,
            Department::Admin,
            Duration::hours(2),
            SECRET,
        )
        .unwrap();

        assert_eq!(pair.expires_in, 7200);

        let access = validate_access_token(&pair.token, SECRET).unwrap();
        let refresh = validate_refresh_token(&pair.refresh_token, SECRET).unwrap();
        assert_eq!(access.user_id, user_id);
        assert_eq!(refresh.user_id, user_id);
        assert!(access.exp < refresh.exp);
    }
}
