use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hashing;
pub mod interactions;
pub mod models;
pub mod policy;
pub mod repository;
pub mod seed;
pub mod visibility;

// Routing split by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use hashing::{BcryptHasher, HasherState, MockHasher};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::register_user, handlers::login_user, handlers::logout_user,
        handlers::list_poems, handlers::get_poem, handlers::create_poem, handlers::update_poem,
        handlers::delete_poem, handlers::admin_delete_poem,
        handlers::list_galleries, handlers::get_gallery, handlers::create_gallery,
        handlers::rename_gallery, handlers::delete_gallery,
        handlers::like_poem, handlers::unlike_poem, handlers::save_poem, handlers::unsave_poem,
        handlers::mark_poem_read,
        handlers::liked_poems, handlers::saved_poems, handlers::get_poem_interactions,
        handlers::get_poet_stats
    ),
    components(
        schemas(
            models::Role, models::User, models::Gallery, models::Poem, models::PoetStats,
            models::RegisterRequest, models::LoginRequest, models::GalleryRequest,
            models::PoemRequest, models::AuthResponse, models::PoemEnvelope, models::PoemList,
            models::GalleryEnvelope, models::GallerySummary, models::GalleryList,
            models::OkResponse, models::InteractionResponse, models::PoemInteractions,
            models::PoetStatsEnvelope, error::ErrorBody,
        )
    ),
    tags(
        (name = "poetry-journal", description = "Poetry Journal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The shared, cloneable container of every service a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Storage behind the `Repository` trait (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Password hashing (bcrypt in production, a cheap mock in tests).
    pub hasher: HasherState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for HasherState {
    fn from_ref(app_state: &AppState) -> HasherState {
        app_state.hasher.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 before it reaches a handler unless `AuthUser` resolves.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(AllowOrigin::list(allowed))
}

/// create_router
///
/// Assembles the `/api` routes, the Swagger UI, the optional single-page-app fallback and
/// the observability layers around them.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");
    let cors = cors_layer(&state.config.cors_origins);
    let static_dir = state.config.static_dir.clone();

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest("/admin", admin::admin_routes());

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .with_state(state);

    // Unknown non-API paths fall through to the client app's index.html.
    if let Some(dir) = static_dir {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the `x-request-id`, so every log line of a
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
