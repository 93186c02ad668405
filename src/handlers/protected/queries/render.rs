// handlers/protected/queries/render.rs - POST /api/queries/:name/render

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;

use super::ParametersBody;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::RenderedQuery;

/// Validate and substitute without touching the database
pub async fn query_render(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ParametersBody>, JsonRejection>,
) -> ApiResult<RenderedQuery> {
    let Json(body) = payload?;
    let rendered = state.queries.render(&name, &body.parameters).await?;
    Ok(ApiResponse::success(rendered))
}
