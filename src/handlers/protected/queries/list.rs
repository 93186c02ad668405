// handlers/protected/queries/list.rs - GET /api/queries

use axum::extract::{rejection::QueryRejection, Query, State};

use crate::app::AppState;
use crate::database::TemplateFilter;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::QueryTemplate;

/// Filters: `category`, `collection`, `tag`, `search`, `include_inactive`
pub async fn query_list(
    State(state): State<AppState>,
    filter: Result<Query<TemplateFilter>, QueryRejection>,
) -> ApiResult<Vec<QueryTemplate>> {
    let Query(filter) = filter.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let templates = state.queries.list(&filter).await?;
    Ok(ApiResponse::success(templates))
}
