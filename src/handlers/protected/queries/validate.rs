// handlers/protected/queries/validate.rs - POST /api/queries/:name/validate

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;

use super::ParametersBody;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ValidationReport;

/// Dry run: always 200, `{valid, errors}`
pub async fn query_validate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ParametersBody>, JsonRejection>,
) -> ApiResult<ValidationReport> {
    let Json(body) = payload?;
    let report = state.queries.check(&name, &body.parameters).await?;
    Ok(ApiResponse::success(report))
}
