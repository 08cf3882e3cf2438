/// Database layer
///
/// - `pool`: PostgreSQL connection pool, eager or lazy, with health checks
/// - `migrations`: embedded schema migrations from `migrations/`
///
/// Models and their queries live in [`crate::models`].
///
/// # Example
///
/// ```no_run
/// use portal_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;

/// Whether an error means the database could not be reached at all
///
/// Handlers turn these into 503 instead of 500.
pub fn is_unavailable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)
    )
}

/// Whether an error is a unique-constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
