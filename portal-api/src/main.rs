//! # Business Portal API Server
//!
//! REST API and real-time channel behind the business portal frontend.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Authentication (JWT access and refresh tokens)
//! - Department-scoped users and projects
//! - Public contact form with admin triage
//! - WebSocket rooms for dashboard notifications
//!
//! The server starts even when PostgreSQL is down; database-backed routes
//! answer 503 and `/api/health` reports `degraded` until it comes back.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p portal-api
//! ```

use anyhow::Context;
use portal_api::{
    app::{build_router, AppState},
    bootstrap::{self, BootstrapOutcome},
    config::Config,
};
use portal_shared::db::{
    migrations,
    pool::{self, DatabaseConfig},
};
use sqlx::PgPool;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(config.is_production());

    tracing::info!(
        environment = %config.api.environment,
        "Business Portal API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let db = connect_database(&config).await?;

    if let Some(admin) = &config.bootstrap_admin {
        match bootstrap::ensure_admin(&db, admin).await {
            Ok(BootstrapOutcome::Created(id)) => tracing::info!(user_id = %id, "Admin account ready"),
            Ok(BootstrapOutcome::AlreadyExists(_)) => tracing::debug!("Bootstrap admin already exists"),
            Err(e) => tracing::warn!(error = %e, "Could not bootstrap admin account"),
        }
    }

    let bind_address = config.bind_address();
    let state = AppState::new(db.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portal_api=debug,portal_shared=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Connects to PostgreSQL, falling back to a lazy pool when it is unreachable
async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let db_config = DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    };

    match pool::create_pool(db_config.clone()).await {
        Ok(db) => {
            if config.database.run_migrations {
                migrations::run_migrations(&db)
                    .await
                    .context("Failed to apply database migrations")?;
            }
            Ok(db)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Database unavailable at startup; serving in degraded mode"
            );
            pool::create_lazy_pool(db_config).context("Invalid DATABASE_URL")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
