/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhive_api::{app::AppState, config::Config};
/// use taskhive_shared::store::memory::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = taskhive_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Extension, Router,
};
use std::sync::Arc;
use taskhive_shared::{
    auth::middleware::{authenticate, bearer_token, AuthContext, AuthError},
    chat::ChatService,
    groups::GroupService,
    realtime::Notifier,
    store::Store,
    tasks::TaskService,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

/// Headroom above the image cap for the other multipart fields
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every member is reference counted, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend
    pub store: Arc<dyn Store>,

    /// Application configuration
    pub config: Arc<Config>,

    pub groups: GroupService,
    pub tasks: TaskService,
    pub chat: ChatService,
}

impl AppState {
    /// Wires the services around one store and a fresh notifier
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let notifier = Arc::new(Notifier::new());
        Self {
            groups: GroupService::new(store.clone()),
            tasks: TaskService::new(store.clone()),
            chat: ChatService::new(store.clone(), notifier),
            store,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        self.chat.notifier()
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # Health check (public)
/// ├── /uploads/:file                       # Stored task images (public)
/// └── /api/
///     ├── /users/register, /users/login    # public
///     ├── GET  /users/profile              # token
///     ├── /groups                          # token
///     │   ├── GET  /all                    # token + admin
///     │   ├── PUT  /:id/members            # token + admin
///     │   └── POST /:id/join, /:id/leave
///     ├── /tasks, /tasks/:id               # token, multipart bodies
///     ├── /chat/:group_id/messages         # token
///     └── GET /realtime                    # WebSocket, token in query or header
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication and admin checks (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Registration and login (public)
    let public_routes = Router::new()
        .route("/users/register", post(routes::users::register))
        .route("/users/login", post(routes::users::login));

    // Admin-only group routes
    let admin_routes = Router::new()
        .route("/groups/all", get(routes::groups::list_all_groups))
        .route("/groups/:id/members", put(routes::groups::update_members))
        .route_layer(middleware::from_fn(admin_only_layer));

    // Routes requiring a valid token
    let protected_routes = Router::new()
        .route("/users/profile", get(routes::users::profile))
        .route(
            "/groups",
            post(routes::groups::create_group).get(routes::groups::list_groups),
        )
        .route(
            "/groups/:id",
            put(routes::groups::update_group).delete(routes::groups::delete_group),
        )
        .route("/groups/:id/join", post(routes::groups::join_group))
        .route("/groups/:id/leave", post(routes::groups::leave_group))
        .route(
            "/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route(
            "/chat/:group_id/messages",
            get(routes::chat::list_messages).post(routes::chat::send_message),
        )
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    // The upgrade authenticates itself so the token can ride in the query string
    let realtime_routes = Router::new().route("/realtime", get(routes::realtime::connect));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(realtime_routes);

    let cors = build_cors(&state.config);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.uploads.dir))
        .layer(DefaultBodyLimit::max(
            state.config.uploads.max_bytes + FORM_OVERHEAD_BYTES,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Span for one request; records the path only since the query may carry a token
fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

fn build_cors(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
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
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Extracts and validates the bearer token, then injects `AuthContext`
/// into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.ok_or(AuthError::MissingCredentials)?;
    let auth = authenticate(token, state.jwt_secret())?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Rejects non-admins; runs after `jwt_auth_layer`
async fn admin_only_layer(
    Extension(auth): Extension<AuthContext>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !auth.is_admin {
        tracing::warn!(user_id = %auth.user_id, path = %req.uri().path(), "Admin route denied");
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
