// handlers/protected/queries/restore.rs - POST /api/queries/:name/restore (admin)

use axum::extract::{Path, State};
use axum::Extension;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::query::QueryTemplate;

pub async fn query_restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<QueryTemplate> {
    user.require_admin()?;
    let template = state.queries.restore(&name).await?;
    Ok(ApiResponse::success(template))
}
