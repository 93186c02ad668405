// handlers/protected/queries/delete.rs - DELETE /api/queries/:name (admin, soft delete)

use axum::extract::{Path, State};
use axum::Extension;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::query::QueryTemplate;

pub async fn query_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<QueryTemplate> {
    user.require_admin()?;
    let template = state.queries.deactivate(&name).await?;
    Ok(ApiResponse::success(template))
}
