/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Test database setup and migrations
/// - One admin, one manager and one staff account per context
/// - JWT token generation
/// - Request helpers

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use portal_api::app::{build_router, AppState};
use portal_api::config::Config;
use portal_shared::auth::{
    jwt::{create_token, Claims, TokenType},
    middleware::AuthContext,
    password,
};
use portal_shared::db::migrations::run_migrations;
use portal_shared::models::{
    department::Department,
    user::{CreateUser, User, UserRole},
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const TEST_PASSWORD: &str = "Sup3r$ecretPass";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub state: AppState,
    pub app: axum::Router,
    pub admin: User,
    pub manager: User,
    pub staff: User,
}

impl TestContext {
    /// Creates a new test context against `DATABASE_URL`
    pub async fn new() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            "APP_ENV" => Some("test".to_string()),
            "RATE_LIMIT_PER_MINUTE" => Some("1000".to_string()),
            _ => None,
        })?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let password_hash = password::hash_password(TEST_PASSWORD)?;
        let admin = create_user(&db, &password_hash, UserRole::Admin, Department::Admin).await?;
        let manager = create_user(&db, &password_hash, UserRole::Manager, Department::Hr).await?;
        let staff = create_user(&db, &password_hash, UserRole::Staff, Department::Hr).await?;

        let state = AppState::new(db.clone(), config);
        let app = build_router(state.clone());

        Ok(TestContext {
            db,
            state,
            app,
            admin,
            manager,
            staff,
        })
    }

    /// Returns an access token for `user`
    pub fn token_for(&self, user: &User) -> String {
        let claims = Claims::new(user.id, user.role, user.department, TokenType::Access);
        create_token(&claims, TEST_SECRET).expect("token")
    }

    /// Hub identity of `user`, as the socket handshake would build it
    pub fn auth_context(&self, user: &User) -> AuthContext {
        AuthContext::new(user.id, user.role, user.department)
    }

    /// Sends a request, with a JSON body and bearer token when given
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("infallible")
    }

    /// Cleans up test data
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        for user in [&self.admin, &self.manager, &self.staff] {
            User::delete(&self.db, user.id).await?;
        }
        Ok(())
    }
}

async fn create_user(
    db: &PgPool,
    password_hash: &str,
    role: UserRole,
    department: Department,
) -> anyhow::Result<User> {
    Ok(User::create(
        db,
        CreateUser {
            email: format!("test-{}@example.com", Uuid::new_v4()),
            password_hash: password_hash.to_string(),
            name: format!("Test {}", role),
            role,
            department,
        },
    )
    .await?)
}

/// Reads a JSON response body
pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json body")
}
