use crate::error::ApiError;
use crate::models::SearchResponse;
use crate::state::AppState;
use crate::validation::{SearchQuery, SearchSpecFactory};
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{info, warn};

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let spec = SearchSpecFactory::from_query(&query).map_err(|e| {
        warn!("SEARCH rejected: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "SEARCH: keyword={}, platforms={:?}, limit={}, timeout={:?}",
        spec.keyword(),
        spec.platforms(),
        spec.limit(),
        spec.per_source_timeout()
    );

    let result = state.dispatcher.run(&spec).await?;
    Ok(Json(result.into()))
}
