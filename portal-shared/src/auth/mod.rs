/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: HS256 access/refresh token creation and validation
/// - [`middleware`]: Bearer-token extraction into an [`middleware::AuthContext`]
/// - [`authorization`]: Role and department checks
///
/// # Example
///
/// ```no_run
/// use portal_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use portal_shared::auth::password::{hash_password, verify_password};
/// use portal_shared::models::{department::Department, user::UserRole};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Welcome2Portal")?;
/// assert!(verify_password("Welcome2Portal", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), UserRole::Staff, Department::Hr, TokenType::Access);
/// let token = create_token(&claims, "a-secret-that-is-at-least-32-bytes!")?;
/// let validated = validate_access_token(&token, "a-secret-that-is-at-least-32-bytes!")?;
/// assert_eq!(validated.role, UserRole::Staff);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
