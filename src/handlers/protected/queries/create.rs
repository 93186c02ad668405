// handlers/protected/queries/create.rs - POST /api/queries (admin)

use axum::extract::{rejection::JsonRejection, State};
use axum::{Extension, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::query::{NewQueryTemplate, QueryTemplate};

/// 201 with the stored template, 409 if the name is taken
pub async fn query_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewQueryTemplate>, JsonRejection>,
) -> ApiResult<QueryTemplate> {
    user.require_admin()?;
    let Json(definition) = payload?;

    let template = state.queries.create(definition, user.owner_id()).await?;
    tracing::info!("{} created query '{}'", user.email, template.name);
    Ok(ApiResponse::created(template))
}
