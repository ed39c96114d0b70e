use crate::models::{HealthData, HealthResponse, API_VERSION};
use crate::state::AppState;
use axum::{extract::State, Json};
use bazaar::domain::Platform;
use chrono::Utc;

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.dispatcher.configured_platforms();
    let platforms = Platform::ALL
        .into_iter()
        .map(|p| {
            let status = if configured.contains(&p) {
                "operational"
            } else {
                "unconfigured"
            };
            (p, status)
        })
        .collect();

    let status = if configured.is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        success: true,
        data: HealthData {
            status,
            uptime: state.started_at.elapsed().as_secs(),
            version: API_VERSION,
            platforms,
            archive: if state.archive.is_some() {
                "enabled"
            } else {
                "disabled"
            },
            cache: state.dispatcher.cache().stats().into(),
        },
        timestamp: Utc::now(),
    })
}
