// handlers/public/mod.rs - Unauthenticated endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET / - service information
pub async fn root() -> impl IntoResponse {
    ApiResponse::success(json!({
        "name": "Campus API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Template-driven dynamic queries over users, universities, faculties and carts",
        "endpoints": {
            "health": "/health (public)",
            "queries": "/api/queries[/:name] (protected, mutations require admin)",
            "validate": "/api/queries/:name/validate (protected)",
            "render": "/api/queries/:name/render (protected)",
            "execute": "/api/queries/execute (protected)"
        }
    }))
}

/// GET /health - registry connectivity and template cache counters
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let cache = state.queries.cache_stats().await;

    match state.queries.ping().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok",
            "cache": cache
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
                .into_response()
        }
    }
}
