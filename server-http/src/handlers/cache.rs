use crate::error::ApiError;
use crate::models::{
    CacheEntriesResponse, CacheStatsResponse, ClearCacheResponse, EntryBody, ResetStatsResponse,
};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use tracing::info;

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        success: true,
        data: state.dispatcher.cache().stats().into(),
        timestamp: Utc::now(),
    })
}

/// GET /api/cache/entries
pub async fn cache_entries(
    State(state): State<AppState>,
) -> Result<Json<CacheEntriesResponse>, ApiError> {
    let mut entries: Vec<EntryBody> = state
        .dispatcher
        .cache()
        .entries()
        .await?
        .into_iter()
        .map(EntryBody::from)
        .collect();
    entries.sort_by_key(|e| e.remaining_ms);

    Ok(Json(CacheEntriesResponse {
        success: true,
        count: entries.len(),
        entries,
    }))
}

/// DELETE /api/cache
pub async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let cleared = state.dispatcher.cache().clear().await?;
    info!("CLEAR_CACHE: removed {} entries", cleared);

    Ok(Json(ClearCacheResponse {
        success: true,
        cleared,
    }))
}

/// POST /api/cache/stats/reset
pub async fn reset_cache_stats(State(state): State<AppState>) -> Json<ResetStatsResponse> {
    state.dispatcher.cache().reset_stats();
    info!("RESET_CACHE_STATS");
    Json(ResetStatsResponse { success: true })
}
