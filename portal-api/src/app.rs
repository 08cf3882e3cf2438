/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use portal_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = portal_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, Uri},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use portal_shared::{
    auth::{
        authorization,
        middleware::{authenticate, AuthContext},
    },
    models::user::User,
    realtime::Hub,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Instant};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Real-time connection registry
    pub hub: Arc<Hub>,

    /// Buckets of the rate-limited routes
    pub rate_limiter: Arc<RateLimiter>,

    pub started_at: Instant,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(RateLimit::per_minute(
            config.rate_limit.requests_per_minute,
        ));

        Self {
            db,
            config: Arc::new(config),
            hub: Arc::new(Hub::new()),
            rate_limiter: Arc::new(rate_limiter),
            started_at: Instant::now(),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /api
/// ├── GET  /health                    # Health check (public)
/// ├── /auth/
/// │   ├── POST /register              # rate limited
/// │   ├── POST /login                 # rate limited
/// │   ├── POST /refresh               # rate limited
/// │   └── GET  /me                    # bearer
/// ├── /users/                         # bearer
/// │   ├── GET  /
/// │   ├── GET  /me
/// │   ├── PUT  /me/password
/// │   └── GET|PUT /:id
/// ├── /projects/                      # bearer
/// │   ├── GET|POST /
/// │   └── GET|PUT|DELETE /:id
/// ├── /contact/
/// │   ├── POST /                      # public, rate limited
/// │   ├── GET  /                      # admin
/// │   ├── GET|DELETE /:id             # admin
/// │   └── PUT  /:id/status            # admin
/// ├── /admin/                         # admin
/// │   ├── GET  /stats
/// │   ├── GET  /users
/// │   ├── PUT  /users/:id/role
/// │   ├── PUT  /users/:id/status
/// │   ├── DELETE /users/:id
/// │   └── POST /notifications
/// └── /socket/
///     ├── GET  /                      # WebSocket upgrade
///     ├── GET  /status                # bearer
///     └── POST /emit                  # admin
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Rate limiting, authentication and the admin check (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .merge(
            Router::new()
                .route("/me", get(routes::auth::me))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer)),
        );

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/me", get(routes::auth::me))
        .route("/me/password", put(routes::users::change_password))
        .route(
            "/:id",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let contact_routes = Router::new()
        .route("/", post(routes::contact::submit_contact))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer))
        .merge(
            Router::new()
                .route("/", get(routes::contact::list_contacts))
                .route(
                    "/:id",
                    get(routes::contact::get_contact).delete(routes::contact::delete_contact),
                )
                .route("/:id/status", put(routes::contact::update_contact_status))
                .route_layer(from_fn(admin_only_layer))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer)),
        );

    let admin_routes = Router::new()
        .route("/stats", get(routes::admin::stats))
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id", delete(routes::admin::delete_user))
        .route("/users/:id/role", put(routes::admin::update_user_role))
        .route("/users/:id/status", put(routes::admin::update_user_status))
        .route("/notifications", post(routes::admin::send_notification))
        .route_layer(from_fn(admin_only_layer))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let socket_routes = Router::new()
        .route("/", get(routes::socket::socket_handler))
        .merge(
            Router::new()
                .route("/status", get(routes::socket::socket_status))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer)),
        )
        .merge(
            Router::new()
                .route("/emit", post(routes::socket::emit_event))
                .route_layer(from_fn(admin_only_layer))
                .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer)),
        );

    let api_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/contact", contact_routes)
        .nest("/admin", admin_routes)
        .nest("/socket", socket_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let enable_hsts = state.config.is_production();

    Router::new()
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(enable_hsts))
        .with_state(state)
}

/// Replaces token claims with the caller's stored account
///
/// Role and department come from the database row, so admin changes apply
/// to tokens that are already out. Deleted or deactivated accounts are 401.
pub async fn current_identity(db: &PgPool, claims: AuthContext) -> Result<AuthContext, ApiError> {
    let user = User::find_by_id(db, claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    if user.role != claims.role || user.department != claims.department {
        tracing::debug!(user_id = %user.id, "Token claims are stale; using stored role");
    }

    Ok(AuthContext::new(user.id, user.role, user.department))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, resolves it with [`current_identity`] and
/// injects the resulting [`AuthContext`] into the request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate(req.headers(), state.jwt_secret())?;
    let auth_context = current_identity(&state.db, claims).await?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Admin check; must run inside [`jwt_auth_layer`]
async fn admin_only_layer(req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;
    authorization::require_admin(auth)?;

    Ok(next.run(req).await)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}
