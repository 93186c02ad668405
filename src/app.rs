use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers::{protected::queries, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<QueryService>,
}

impl AppState {
    pub fn new(queries: QueryService) -> Self {
        Self {
            queries: Arc::new(queries),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api_config = &config::config().api;

    let mut app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(query_routes())
        .layer(DefaultBodyLimit::max(api_config.max_request_size_bytes))
        .layer(cors_layer());

    if api_config.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn query_routes() -> Router<AppState> {
    Router::new()
        .route("/api/queries", get(queries::query_list).post(queries::query_create))
        .route("/api/queries/execute", post(queries::query_execute))
        .route(
            "/api/queries/:name",
            get(queries::query_show)
                .put(queries::query_update)
                .delete(queries::query_delete),
        )
        .route("/api/queries/:name/restore", post(queries::query_restore))
        .route("/api/queries/:name/validate", post(queries::query_validate))
        .route("/api/queries/:name/render", post(queries::query_render))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn cors_layer() -> CorsLayer {
    let security = &config::config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
}
