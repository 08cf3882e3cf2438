/// Health check endpoint
///
/// ```text
/// GET /api/health
/// ```
///
/// Always answers 200 while the process is up; `status` is `degraded` when
/// the database cannot be reached within [`DATABASE_PROBE_TIMEOUT`].
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "environment": "development",
///   "database": "connected",
///   "socketConnections": 3,
///   "uptimeSeconds": 5321,
///   "timestamp": "2025-03-01T12:00:00Z"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use portal_shared::db::pool;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;

/// Upper bound on the `SELECT 1` probe, well below the pool's acquire timeout
pub const DATABASE_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub socket_connections: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

async fn database_status(db: &PgPool) -> &'static str {
    match tokio::time::timeout(DATABASE_PROBE_TIMEOUT, pool::health_check(db)).await {
        Ok(Ok(())) => "connected",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = DATABASE_PROBE_TIMEOUT.as_millis() as u64,
                "Health check timed out waiting for the database"
            );
            "disconnected"
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = database_status(&state.db).await;

    Json(HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.api.environment.to_string(),
        database: database.to_string(),
        socket_connections: state.hub.connection_count().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
