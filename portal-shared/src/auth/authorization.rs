/// Role and department checks
///
/// # Permission Model
///
/// 1. **Role hierarchy**: Admin > Manager > Staff
/// 2. **Department scope**: admins act on every department; everyone else only
///    reads data of their own department
/// 3. **Department writes**: managers (and admins) change department data
/// 4. **Self-service**: users may read and edit their own account
///
/// All checks are pure functions over the [`AuthContext`] carried in the
/// token, so handlers call them before touching the database.
///
/// # Example
///
/// ```
/// use portal_shared::auth::authorization::{require_department_access, require_role};
/// use portal_shared::auth::middleware::AuthContext;
/// use portal_shared::models::{department::Department, user::UserRole};
/// use uuid::Uuid;
///
/// let auth = AuthContext::new(Uuid::new_v4(), UserRole::Manager, Department::Accounts);
/// assert!(require_role(&auth, UserRole::Manager).is_ok());
/// assert!(require_department_access(&auth, Department::Accounts).is_ok());
/// assert!(require_department_access(&auth, Department::Hr).is_err());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::{department::Department, user::UserRole};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    #[error("No access to department {0}")]
    OtherDepartment(Department),

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Requires at least `required` in the role hierarchy
pub fn require_role(auth: &AuthContext, required: UserRole) -> Result<(), AuthzError> {
    if !auth.role.has_permission(&required) {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: auth.role,
        });
    }

    Ok(())
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, UserRole::Admin)
}

/// Allows the account owner or an admin
pub fn require_self_or_admin(auth: &AuthContext, user_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == user_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Read access to data scoped to `department`
pub fn require_department_access(
    auth: &AuthContext,
    department: Department,
) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.department == department {
        Ok(())
    } else {
        Err(AuthzError::OtherDepartment(department))
    }
}

/// Write access to data scoped to `department` (manager of it, or admin)
pub fn require_department_write(
    auth: &AuthContext,
    department: Department,
) -> Result<(), AuthzError> {
    require_department_access(auth, department)?;
    require_role(auth, UserRole::Manager)
}

/// Department a listing should be restricted to
///
/// Admins may ask for any department (or all, with `None`); everyone else is
/// pinned to their own, and asking for another department is an error.
pub fn scoped_department(
    auth: &AuthContext,
    requested: Option<Department>,
) -> Result<Option<Department>, AuthzError> {
    if auth.is_admin() {
        return Ok(requested);
    }

    match requested {
        Some(department) if department != auth.department => {
            Err(AuthzError::OtherDepartment(department))
        }
        _ => Ok(Some(auth.department)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: UserRole, department: Department) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role, department)
    }

    #[test]
    fn test_require_role() {
        let staff = ctx(UserRole::Staff, Department::Hr);
        assert!(require_role(&staff, UserRole::Staff).is_ok());
        assert_eq!(
            require_role(&staff, UserRole::Manager),
            Err(AuthzError::InsufficientRole {
                required: UserRole::Manager,
                actual: UserRole::Staff,
            })
        );

        assert!(require_admin(&ctx(UserRole::Admin, Department::Admin)).is_ok());
        assert!(require_admin(&ctx(UserRole::Manager, Department::Admin)).is_err());
    }

    #[test]
    fn test_require_self_or_admin() {
        let staff = ctx(UserRole::Staff, Department::Hr);
        assert!(require_self_or_admin(&staff, staff.user_id).is_ok());
        assert_eq!(
            require_self_or_admin(&staff, Uuid::new_v4()),
            Err(AuthzError::NotAuthorized)
        );

        let admin = ctx(UserRole::Admin, Department::Admin);
        assert!(require_self_or_admin(&admin, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_department_access() {
        let manager = ctx(UserRole::Manager, Department::DigitalMarketing);
        assert!(require_department_access(&manager, Department::DigitalMarketing).is_ok());
        assert_eq!(
            require_department_access(&manager, Department::Accounts),
            Err(AuthzError::OtherDepartment(Department::Accounts))
        );

        let admin = ctx(UserRole::Admin, Department::Admin);
        assert!(require_department_access(&admin, Department::Accounts).is_ok());
    }

    #[test]
    fn test_department_write() {
        let manager = ctx(UserRole::Manager, Department::Hr);
        let staff = ctx(UserRole::Staff, Department::Hr);

        assert!(require_department_write(&manager, Department::Hr).is_ok());
        assert!(require_department_write(&manager, Department::Accounts).is_err());
        assert!(require_department_write(&staff, Department::Hr).is_err());
        assert!(require_department_write(&ctx(UserRole::Admin, Department::Admin), Department::Hr).is_ok());
    }

    #[test]
    fn test_scoped_department() {
        let admin = ctx(UserRole::Admin, Department::Admin);
        assert_eq!(scoped_department(&admin, None), Ok(None));
        assert_eq!(
            scoped_department(&admin, Some(Department::Hr)),
            Ok(Some(Department::Hr))
        );

        let staff = ctx(UserRole::Staff, Department::Secretariat);
        assert_eq!(scoped_department(&staff, None), Ok(Some(Department::Secretariat)));
        assert_eq!(
            scoped_department(&staff, Some(Department::Secretariat)),
            Ok(Some(Department::Secretariat))
        );
        assert!(scoped_department(&staff, Some(Department::Hr)).is_err());
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::OtherDepartment(Department::Accounts);
        assert!(err.to_string().contains("accounts"));

        let err = AuthzError::InsufficientRole {
            required: UserRole::Admin,
            actual: UserRole::Staff,
        };
        assert_eq!(err.to_string(), "Insufficient permissions: requires admin, has staff");
    }
}
