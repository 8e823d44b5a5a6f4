/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamboard_api::{app::AppState, config::Config};
/// use teamboard_shared::storage::LocalAttachmentStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let store = Arc::new(LocalAttachmentStore::new(&config.uploads.dir, &config.uploads.base_url));
/// let state = AppState::new(pool, config, store);
/// let app = teamboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use teamboard_shared::{auth::middleware::create_jwt_middleware, storage::AttachmentStore};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
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

    /// Where comment attachments are written
    pub store: Arc<dyn AttachmentStore>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, store: Arc<dyn AttachmentStore>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            store,
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
/// /
/// ├── GET  /health                      # public
/// ├── /auth/                            # public except /me
/// │   ├── POST /register
/// │   ├── POST /login
/// │   ├── POST /refresh
/// │   ├── POST /logout
/// │   └── GET  /me
/// ├── GET|PUT /users/:id
/// ├── POST|GET /teams
/// ├── GET|DELETE /teams/:id             # roster / delete
/// ├── POST|PATCH|GET /team-member/:id   # invite (team) / respond (row) / picker (team)
/// ├── POST|GET /projects
/// ├── POST|GET /tasks
/// ├── PATCH|DELETE /tasks/:id
/// ├── POST /tasks/:id/toggle
/// ├── POST /tasks/:id/comments          # multipart
/// └── GET  <UPLOAD_BASE_URL>/*          # stored attachments
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Body size limit (tower-http RequestBodyLimitLayer)
/// 4. Authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/users/:id",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route(
            "/teams",
            post(routes::teams::create_team).get(routes::teams::list_teams),
        )
        .route(
            "/teams/:id",
            get(routes::teams::team_roster).delete(routes::teams::delete_team),
        )
        .route(
            "/team-member/:id",
            post(routes::team_members::invite_member)
                .patch(routes::team_members::respond_to_invite)
                .get(routes::team_members::assignable_members),
        )
        .route(
            "/projects",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .route(
            "/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            axum::routing::patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/tasks/:id/toggle", post(routes::tasks::toggle_task))
        .route("/tasks/:id/comments", post(routes::comments::add_comment))
        .route_layer(axum::middleware::from_fn(create_jwt_middleware(
            state.config.jwt.secret.clone(),
        )));

    let uploads = ServeDir::new(&state.config.uploads.dir);

    Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .merge(protected_routes)
        .nest_service(&state.config.uploads.base_url, uploads)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.uploads.max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
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
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
