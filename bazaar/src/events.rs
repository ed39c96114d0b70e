use crate::domain::{Platform, SourceOutcome};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Started(SearchStartedEvent),
    PlatformSettled(PlatformSettledEvent),
    Completed(SearchCompletedEvent),
}

impl SearchEvent {
    pub fn request_id(&self) -> &str {
        match self {
            SearchEvent::Started(e) => &e.request_id,
            SearchEvent::PlatformSettled(e) => &e.request_id,
            SearchEvent::Completed(e) => &e.request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SearchEvent::Started(_) => "started",
            SearchEvent::PlatformSettled(_) => "settled",
            SearchEvent::Completed(_) => "completed",
        }
    }

    pub fn involves(&self, platform: Platform) -> bool {
        match self {
            SearchEvent::Started(e) => e.platforms.contains(&platform),
            SearchEvent::PlatformSettled(e) => e.platform == platform,
            SearchEvent::Completed(e) => e.platforms.contains(&platform),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStartedEvent {
    pub request_id: String,
    pub keyword: String,
    pub platforms: Vec<Platform>,
    pub limit: u32,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettledEvent {
    pub request_id: String,
    pub platform: Platform,
    pub outcome: SourceOutcome,
    pub item_count: usize,
    pub elapsed_ms: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCompletedEvent {
    pub request_id: String,
    pub keyword: String,
    pub platforms: Vec<Platform>,
    pub requested_platforms: usize,
    pub successful_platforms: usize,
    pub total_items: usize,
    pub from_cache: bool,
    pub elapsed_ms: u64,
    pub timestamp: u64,
}

/// Helper to get current timestamp in seconds since UNIX epoch
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
