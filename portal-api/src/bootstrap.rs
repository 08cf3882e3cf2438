/// First admin account
///
/// Self-registration only ever creates staff accounts, so a fresh database
/// needs an admin seeded from `ADMIN_EMAIL` / `ADMIN_PASSWORD`. The account
/// is created once; an existing user with that email is left untouched.

use crate::config::AdminBootstrap;
use anyhow::Context;
use portal_shared::{
    auth::password,
    models::{
        department::Department,
        user::{CreateUser, User, UserRole},
    },
};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(Uuid),
    AlreadyExists(Uuid),
}

/// Creates the bootstrap admin unless the email is already taken
///
/// # Errors
///
/// Fails on a weak password or a database error.
pub async fn ensure_admin(pool: &PgPool, admin: &AdminBootstrap) -> anyhow::Result<BootstrapOutcome> {
    let email = admin.email.trim().to_string();

    if let Some(existing) = User::find_by_email(pool, &email).await? {
        if existing.role != UserRole::Admin {
            tracing::warn!(
                user_id = %existing.id,
                role = %existing.role,
                "Bootstrap admin email belongs to a non-admin account; leaving it unchanged"
            );
        }
        return Ok(BootstrapOutcome::AlreadyExists(existing.id));
    }

    password::validate_password_strength(&admin.password)
        .context("ADMIN_PASSWORD is too weak")?;
    let password_hash = password::hash_password(&admin.password)?;

    let user = User::create(
        pool,
        CreateUser {
            email,
            password_hash,
            name: admin.name.clone(),
            role: UserRole::Admin,
            department: Department::Admin,
        },
    )
    .await
    .context("Failed to create bootstrap admin")?;

    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");

    Ok(BootstrapOutcome::Created(user.id))
}
