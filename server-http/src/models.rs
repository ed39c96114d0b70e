use bazaar::domain::{
    AggregatedResult, ArchivedResult, CacheStats, EntryInfo, Platform, PlatformResult, Product,
    SourceOutcome,
};
use bazaar::keys::decode_key;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

// === Search Models ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    pub data: SearchData,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    pub keyword: String,
    pub search_time: u64,
    pub total_platforms: usize,
    pub successful_platforms: usize,
    pub total_products: usize,
    pub platforms: BTreeMap<Platform, PlatformBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformBody {
    pub platform: Platform,
    pub success: bool,
    pub outcome: SourceOutcome,
    pub count: usize,
    pub products: Vec<Product>,
    pub scrape_time: u64,
    pub scraped_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub from_cache: bool,
}

impl From<PlatformResult> for PlatformBody {
    fn from(result: PlatformResult) -> Self {
        Self {
            platform: result.platform,
            success: result.success,
            outcome: result.outcome,
            count: result.items.len(),
            products: result.items,
            scrape_time: result.elapsed.as_millis() as u64,
            scraped_at: result.settled_at,
            error: result.error,
        }
    }
}

impl From<AggregatedResult> for SearchData {
    fn from(result: AggregatedResult) -> Self {
        Self {
            keyword: result.keyword,
            search_time: result.elapsed.as_millis() as u64,
            total_platforms: result.requested_platform_count,
            successful_platforms: result.successful_platform_count,
            total_products: result.total_item_count,
            platforms: result
                .results
                .into_iter()
                .map(|(platform, r)| (platform, r.into()))
                .collect(),
        }
    }
}

impl From<AggregatedResult> for SearchResponse {
    fn from(result: AggregatedResult) -> Self {
        Self {
            success: true,
            message: "Search completed".into(),
            meta: ResponseMeta {
                request_id: result.request_id.clone(),
                version: API_VERSION,
                timestamp: Utc::now(),
                from_cache: result.from_cache,
            },
            data: result.into(),
        }
    }
}

// === Archive Models ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntryResponse {
    pub success: bool,
    pub key: String,
    pub request_id: String,
    pub platforms: Vec<Platform>,
    pub stored_at: Option<DateTime<Utc>>,
    pub data: SearchData,
}

impl From<ArchivedResult> for ArchiveEntryResponse {
    fn from(record: ArchivedResult) -> Self {
        Self {
            success: true,
            key: record.key,
            request_id: record.result.request_id.clone(),
            platforms: record.platforms,
            stored_at: DateTime::from_timestamp_millis(record.stored_at_ms),
            data: record.result.into(),
        }
    }
}

// === Health Models ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub data: HealthData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: &'static str,
    pub uptime: u64,
    pub version: &'static str,
    pub platforms: BTreeMap<Platform, &'static str>,
    pub archive: &'static str,
    pub cache: CacheStatsBody,
}

// === Cache Models ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsBody {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
}

impl From<CacheStats> for CacheStatsBody {
    fn from(stats: CacheStats) -> Self {
        Self {
            size: stats.size,
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            hit_rate: stats.hit_rate,
            total_requests: stats.total_requests,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub success: bool,
    pub data: CacheStatsBody,
    pub timestamp: DateTime<Utc>,
}

/// A cache entry with its key decoded back into the search it answers
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryBody {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    pub age_ms: u64,
    pub ttl_ms: u64,
    pub remaining_ms: u64,
}

impl From<EntryInfo<String>> for EntryBody {
    fn from(entry: EntryInfo<String>) -> Self {
        let decoded = decode_key(&entry.key);
        let (keyword, platforms, limit) = match decoded {
            Some((keyword, platforms, limit)) => (Some(keyword), Some(platforms), Some(limit)),
            None => (None, None, None),
        };

        Self {
            key: entry.key,
            keyword,
            platforms,
            limit,
            age_ms: entry.age.as_millis() as u64,
            ttl_ms: entry.ttl.as_millis() as u64,
            remaining_ms: entry.remaining.as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheEntriesResponse {
    pub success: bool,
    pub count: usize,
    pub entries: Vec<EntryBody>,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetStatsResponse {
    pub success: bool,
}

// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar::domain::SourceResponse;
    use bazaar::keys::derive_key;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_search_response_shape() {
        let result = AggregatedResult::assemble(
            "req_abc",
            "tea",
            2,
            vec![
                PlatformResult::completed(
                    Platform::Pdd,
                    SourceResponse::found(vec![json!({"title": "green tea"}).into()]),
                    Duration::from_millis(1200),
                ),
                PlatformResult::timed_out(Platform::Jd, Duration::from_secs(5)),
            ],
            Duration::from_millis(5003),
        );

        let body = serde_json::to_value(SearchResponse::from(result)).unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["meta"]["requestId"], "req_abc");
        assert_eq!(body["meta"]["fromCache"], false);
        assert_eq!(body["data"]["searchTime"], 5003);
        assert_eq!(body["data"]["totalPlatforms"], 2);
        assert_eq!(body["data"]["successfulPlatforms"], 1);
        assert_eq!(body["data"]["totalProducts"], 1);
        assert_eq!(body["data"]["platforms"]["pdd"]["count"], 1);
        assert_eq!(body["data"]["platforms"]["pdd"]["products"][0]["title"], "green tea");
        assert!(body["data"]["platforms"]["pdd"].get("error").is_none());
        assert_eq!(body["data"]["platforms"]["jd"]["outcome"], "timed_out");
        assert_eq!(body["data"]["platforms"]["jd"]["scrapeTime"], 5000);
    }

    #[test]
    fn test_entry_body_decodes_key() {
        let key = derive_key("usb hub", &[Platform::Taobao, Platform::Jd], 7);
        let body = EntryBody::from(EntryInfo {
            key: key.clone(),
            age: Duration::from_secs(10),
            ttl: Duration::from_secs(300),
            remaining: Duration::from_secs(290),
        });

        assert_eq!(body.key, key);
        assert_eq!(body.keyword.as_deref(), Some("usb hub"));
        assert_eq!(body.platforms, Some(vec![Platform::Jd, Platform::Taobao]));
        assert_eq!(body.limit, Some(7));
        assert_eq!(body.remaining_ms, 290_000);

        let opaque = EntryBody::from(EntryInfo {
            key: "not-a-search-key".to_string(),
            age: Duration::ZERO,
            ttl: Duration::ZERO,
            remaining: Duration::ZERO,
        });
        assert!(opaque.keyword.is_none());
    }
}
