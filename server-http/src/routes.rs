use crate::handlers;
use crate::models::ErrorResponse;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method, StatusCode, Uri},
    routing::{delete, get, post},
    Json, Router,
};
use shared::config::Config;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build and configure the application router
pub fn build_router(state: AppState, config: &Config) -> Router {
    Router::new()
        // Search and health
        .route("/api/search", get(handlers::search))
        .route("/api/health", get(handlers::health_check))
        // Cache administration
        .route("/api/cache", delete(handlers::clear_cache))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/stats/reset", post(handlers::reset_cache_stats))
        .route("/api/cache/entries", get(handlers::cache_entries))
        .route("/api/archive/{key}", get(handlers::archived_result))
        // SSE Events endpoint
        .route("/events", get(handlers::stream_events))
        .fallback(not_found)
        // Middleware
        .layer(cors_layer(&config.allowed_origins))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    let mut body = ErrorResponse::new("No such API endpoint", "NOT_FOUND");
    body.path = Some(uri.path().to_string());
    (StatusCode::NOT_FOUND, Json(body))
}
