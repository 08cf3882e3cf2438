/// Schema migrations
///
/// The SQL files under `migrations/` at the workspace root are embedded at
/// compile time, so the binary carries its own schema.
///
/// # Example
///
/// ```no_run
/// use portal_shared::db::migrations::{get_migration_status, run_migrations};
/// use portal_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     })
///     .await?;
///
///     run_migrations(&pool).await?;
///
///     let status = get_migration_status(&pool).await?;
///     assert!(status.is_up_to_date);
///     Ok(())
/// }
/// ```

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};
use tracing::{debug, error, info};

static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub available_migrations: usize,
    /// Latest applied migration version (timestamp prefix of the file)
    pub latest_version: Option<i64>,
    pub is_up_to_date: bool,
}

/// Number of migrations compiled into the binary
pub fn available_migrations() -> usize {
    MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()).count()
}

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!(available = available_migrations(), "Running database migrations");

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("Database migrations complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Database migration failed");
            Err(e)
        }
    }
}

/// Reports how many migrations have been applied
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let available = available_migrations();

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            available_migrations: available,
            latest_version: None,
            is_up_to_date: available == 0,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied = count as usize;
    debug!(applied, available, latest_version = ?latest_version, "Migration status");

    Ok(MigrationStatus {
        applied_migrations: applied,
        available_migrations: available,
        latest_version,
        is_up_to_date: applied >= available,
    })
}

/// Creates the database named in `database_url` if it is missing
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Database does not exist, creating it");
    Postgres::create_database(database_url).await?;
    info!("Database created");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded() {
        assert!(available_migrations() >= 1);
    }
}
