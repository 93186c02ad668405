// handlers/protected/queries/update.rs - PUT /api/queries/:name (admin)

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{Extension, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::query::{NewQueryTemplate, QueryTemplate};

/// Replaces the definition; statistics and ownership are kept
pub async fn query_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
    payload: Result<Json<NewQueryTemplate>, JsonRejection>,
) -> ApiResult<QueryTemplate> {
    user.require_admin()?;
    let Json(definition) = payload?;

    let template = state.queries.update(&name, definition).await?;
    Ok(ApiResponse::success(template))
}
