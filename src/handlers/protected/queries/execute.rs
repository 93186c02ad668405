// handlers/protected/queries/execute.rs - POST /api/queries/execute

use axum::extract::{rejection::JsonRejection, State};
use axum::{Extension, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ExecuteRequest, ExecutionOutcome};

/**
 * Expected Input:
 * ```json
 * {
 *   "queryName": "findByUni",
 *   "parameters": { "uni": "Colombo" },
 *   "limit": 50,
 *   "offset": 0,
 *   "order": "created_at desc"
 * }
 * ```
 *
 * 400 VALIDATION_ERROR carries every parameter error in `errors`.
 */
pub async fn query_execute(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult<ExecutionOutcome> {
    let Json(request) = payload?;
    tracing::debug!("{} executing '{}'", user.email, request.query_name);

    let outcome = state.queries.execute(request).await?;
    Ok(ApiResponse::success(outcome))
}
