// handlers/protected/queries/show.rs - GET /api/queries/:name

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::QueryTemplate;

#[derive(Debug, Default, Deserialize)]
pub struct ShowQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn query_show(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ShowQuery>,
) -> ApiResult<QueryTemplate> {
    let template = state.queries.get(&name, query.include_inactive).await?;
    Ok(ApiResponse::success(template))
}
