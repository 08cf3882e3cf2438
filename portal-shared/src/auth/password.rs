/// Password hashing and strength rules
///
/// Passwords are stored as Argon2id PHC strings. The cost parameters follow
/// the OWASP baseline for Argon2id (19 MiB, 2 passes, 1 lane) so that login
/// stays well under a request budget on small portal deployments.
///
/// # Example
///
/// ```
/// use portal_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Welcome2Portal")?;
/// assert!(verify_password("Welcome2Portal", &hash)?);
/// assert!(!verify_password("welcome2portal", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

/// Minimum accepted password length (in characters)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Reason a password was rejected by [`validate_password_strength`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WeakPassword {
    #[error("Password must be at least 8 characters long")]
    TooShort,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one digit")]
    MissingDigit,
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(19_456)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// Returns the PHC string, e.g. `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash
///
/// A mismatch is `Ok(false)`; only a malformed hash or an internal failure
/// is an error. Parameters are read from the PHC string, so hashes produced
/// with older cost settings keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    if parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("Hash has no output".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Verifies `password` against a throwaway hash and discards the result
///
/// Login calls this for unknown emails so they cost the same Argon2 pass as
/// a wrong password.
pub fn verify_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    if let Some(hash) = DUMMY_HASH.get_or_init(|| hash_password("no-such-account").ok()) {
        let _ = verify_password(password, hash);
    }
}

/// Checks a candidate password against the portal's password policy
///
/// Requires at least [`MIN_PASSWORD_LENGTH`] characters with an uppercase
/// letter, a lowercase letter and a digit.
///
/// ```
/// use portal_shared::auth::password::{validate_password_strength, WeakPassword};
///
/// assert!(validate_password_strength("Welcome2Portal").is_ok());
/// assert_eq!(validate_password_strength("short1A"), Err(WeakPassword::TooShort));
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), WeakPassword> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(WeakPassword::TooShort);
    }

    if !password.chars().any(char::is_uppercase) {
        return Err(WeakPassword::MissingUppercase);
    }

    if !password.chars().any(char::is_lowercase) {
        return Err(WeakPassword::MissingLowercase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(WeakPassword::MissingDigit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("Welcome2Portal").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_hash_password_uses_fresh_salt() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(matches!(
            verify_password("password", "invalid_hash"),
            Err(PasswordError::InvalidHash(_))
        ));
        assert!(matches!(
            verify_password("password", "$argon2id$invalid"),
            Err(PasswordError::InvalidHash(_))
        ));

        // Parameters and salt but no output
        assert!(matches!(
            verify_password("password", "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_verify_dummy_runs_a_full_verification() {
        let start = std::time::Instant::now();
        verify_dummy("first call builds the hash");
        verify_dummy("second call reuses it");

        // Two Argon2id passes at 19 MiB are never instant
        assert!(start.elapsed() > std::time::Duration::from_millis(1));
    }

    #[test]
    fn test_verify_unicode_password() {
        let hash = hash_password("unicode-密码-パスワード").unwrap();
        assert!(verify_password("unicode-密码-パスワード", &hash).unwrap());
    }

    #[test]
    fn test_validate_password_strength() {
        for password in ["Welcome2Portal", "Accounts2025", "Hr-Team-1"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }

        assert_eq!(validate_password_strength("Sh0rt"), Err(WeakPassword::TooShort));
        assert_eq!(
            validate_password_strength("lowercase1"),
            Err(WeakPassword::MissingUppercase)
        );
        assert_eq!(
            validate_password_strength("UPPERCASE1"),
            Err(WeakPassword::MissingLowercase)
        );
        assert_eq!(validate_password_strength("NoDigitsHere"), Err(WeakPassword::MissingDigit));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 7 characters, more than 8 bytes
        assert_eq!(validate_password_strength("Pässw0ä"), Err(WeakPassword::TooShort));
    }

    #[test]
    fn test_weak_password_message() {
        assert!(WeakPassword::MissingDigit.to_string().contains("digit"));
    }
}
