use crate::error::ApiError;
use crate::models::ArchiveEntryResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Error;
use tracing::info;

/// GET /api/archive/{key}
pub async fn archived_result(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ArchiveEntryResponse>, ApiError> {
    info!("ARCHIVE_LOOKUP: key={}", key);

    let archive = state.archive.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Result archive is disabled",
            "ARCHIVE_DISABLED",
        )
    })?;

    let record = archive.fetch(&key).await?.ok_or(Error::NotFound)?;
    Ok(Json(record.into()))
}
