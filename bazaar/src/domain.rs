use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_KEYWORD_CHARS: usize = 2;
pub const MAX_KEYWORD_CHARS: usize = 50;
pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 20;
pub const MIN_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// The marketplaces a search can be fanned out to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Jd,
    Taobao,
    Pdd,
    Ali1688,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Jd,
        Platform::Taobao,
        Platform::Pdd,
        Platform::Ali1688,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Jd => "jd",
            Platform::Taobao => "taobao",
            Platform::Pdd => "pdd",
            Platform::Ali1688 => "ali1688",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jd" => Ok(Platform::Jd),
            "taobao" => Ok(Platform::Taobao),
            "pdd" => Ok(Platform::Pdd),
            "ali1688" => Ok(Platform::Ali1688),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}

/// A validated search request. Construct with [`SearchSpec::new`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchSpec {
    keyword: String,
    platforms: Vec<Platform>,
    limit: u32,
    per_source_timeout: Duration,
}

impl SearchSpec {
    pub fn new(
        keyword: &str,
        platforms: impl IntoIterator<Item = Platform>,
        limit: u32,
        per_source_timeout: Duration,
    ) -> Result<Self> {
        let keyword = keyword.trim();
        let chars = keyword.chars().count();
        if chars < MIN_KEYWORD_CHARS {
            return Err(Error::invalid(
                "keyword",
                format!("must be at least {} characters", MIN_KEYWORD_CHARS),
            ));
        }
        if chars > MAX_KEYWORD_CHARS {
            return Err(Error::invalid(
                "keyword",
                format!("must be at most {} characters", MAX_KEYWORD_CHARS),
            ));
        }

        // ordered set: first occurrence wins
        let mut unique = Vec::new();
        for platform in platforms {
            if !unique.contains(&platform) {
                unique.push(platform);
            }
        }
        if unique.is_empty() {
            return Err(Error::invalid("platforms", "at least one platform is required"));
        }

        if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
            return Err(Error::invalid(
                "limit",
                format!("{} is outside {}..={}", limit, MIN_LIMIT, MAX_LIMIT),
            ));
        }

        if per_source_timeout < MIN_SOURCE_TIMEOUT || per_source_timeout > MAX_SOURCE_TIMEOUT {
            return Err(Error::invalid(
                "timeout",
                format!(
                    "{}ms is outside {}..={}ms",
                    per_source_timeout.as_millis(),
                    MIN_SOURCE_TIMEOUT.as_millis(),
                    MAX_SOURCE_TIMEOUT.as_millis()
                ),
            ));
        }

        Ok(Self {
            keyword: keyword.to_string(),
            platforms: unique,
            limit,
            per_source_timeout,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn per_source_timeout(&self) -> Duration {
        self.per_source_timeout
    }
}

/// A listing as returned by a source adapter. The core never looks inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Product(pub serde_json::Value);

impl From<serde_json::Value> for Product {
    fn from(value: serde_json::Value) -> Self {
        Product(value)
    }
}

/// What a source adapter hands back for one search
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceResponse {
    pub success: bool,
    #[serde(default, alias = "products")]
    pub items: Vec<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResponse {
    pub fn found(items: Vec<Product>) -> Self {
        Self {
            success: true,
            items,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Terminal state of one platform task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Completed,
    TimedOut,
    Errored,
}

impl SourceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOutcome::Completed => "completed",
            SourceOutcome::TimedOut => "timed_out",
            SourceOutcome::Errored => "errored",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub success: bool,
    pub items: Vec<Product>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub error: Option<String>,
    pub outcome: SourceOutcome,
    pub settled_at: DateTime<Utc>,
}

impl PlatformResult {
    pub fn completed(platform: Platform, response: SourceResponse, elapsed: Duration) -> Self {
        Self {
            platform,
            success: response.success,
            items: response.items,
            elapsed,
            error: response.error,
            outcome: SourceOutcome::Completed,
            settled_at: Utc::now(),
        }
    }

    pub fn timed_out(platform: Platform, timeout: Duration) -> Self {
        Self {
            platform,
            success: false,
            items: Vec::new(),
            elapsed: timeout,
            error: Some(format!("{} timed out", platform)),
            outcome: SourceOutcome::TimedOut,
            settled_at: Utc::now(),
        }
    }

    pub fn errored(platform: Platform, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            platform,
            success: false,
            items: Vec::new(),
            elapsed,
            error: Some(error.into()),
            outcome: SourceOutcome::Errored,
            settled_at: Utc::now(),
        }
    }
}

/// The combined answer for one search across all requested platforms
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub request_id: String,
    pub keyword: String,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub requested_platform_count: usize,
    pub successful_platform_count: usize,
    pub total_item_count: usize,
    pub results: BTreeMap<Platform, PlatformResult>,
    pub from_cache: bool,
    pub created_at: DateTime<Utc>,
}

impl AggregatedResult {
    pub fn assemble(
        request_id: impl Into<String>,
        keyword: impl Into<String>,
        requested_platform_count: usize,
        results: Vec<PlatformResult>,
        elapsed: Duration,
    ) -> Self {
        let successful_platform_count = results.iter().filter(|r| r.success).count();
        let total_item_count = results.iter().map(|r| r.items.len()).sum();

        Self {
            request_id: request_id.into(),
            keyword: keyword.into(),
            elapsed,
            requested_platform_count,
            successful_platform_count,
            total_item_count,
            results: results.into_iter().map(|r| (r.platform, r)).collect(),
            from_cache: false,
            created_at: Utc::now(),
        }
    }

    pub fn failed_platform_count(&self) -> usize {
        self.results.values().filter(|r| !r.success).count()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.results.keys().copied().collect()
    }
}

/// An aggregated result as written by the result archive
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchivedResult {
    pub key: String,
    pub keyword: String,
    pub platforms: Vec<Platform>,
    pub stored_at_ms: i64,
    pub result: AggregatedResult,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
}

impl CacheStats {
    pub fn new(size: usize, hits: u64, misses: u64, sets: u64, deletes: u64) -> Self {
        let total_requests = hits + misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            hits as f64 / total_requests as f64
        };

        Self {
            size,
            hits,
            misses,
            sets,
            deletes,
            hit_rate,
            total_requests,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryInfo<K> {
    pub key: K,
    #[serde(with = "duration_ms")]
    pub age: Duration,
    #[serde(with = "duration_ms")]
    pub ttl: Duration,
    #[serde(with = "duration_ms")]
    pub remaining: Duration,
}

/// Durations travel as integer milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
