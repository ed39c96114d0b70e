use std::time::Duration;
use tracing::warn;

/// Upstream endpoints for the marketplace scrapers, one optional URL per platform id
#[derive(Clone, Debug, Default)]
pub struct SourceEndpoints {
    pub jd: Option<String>,
    pub taobao: Option<String>,
    pub pdd: Option<String>,
    pub ali1688: Option<String>,
}

impl SourceEndpoints {
    /// Pairs of (platform id, url) for every configured endpoint
    pub fn configured(&self) -> Vec<(&'static str, &str)> {
        [
            ("jd", &self.jd),
            ("taobao", &self.taobao),
            ("pdd", &self.pdd),
            ("ali1688", &self.ali1688),
        ]
        .into_iter()
        .filter_map(|(id, url)| url.as_deref().map(|u| (id, u)))
        .collect()
    }
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub data_dir: String,
    pub allowed_origins: Vec<String>,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub archive_retention: Duration,
    pub archive_purge_interval: Duration,
    pub sources: SourceEndpoints,
}

impl Config {
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_HTTP_PORT: u16 = 3000;
    const DEFAULT_CACHE_TTL_SECS: u64 = 300;
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
    const DEFAULT_ARCHIVE_RETENTION_SECS: u64 = 300;
    const DEFAULT_ARCHIVE_PURGE_INTERVAL_SECS: u64 = 600;

    pub fn from_env() -> Self {
        let host = std::env::var("BAZAAR_HOST").unwrap_or_else(|_| "localhost".to_string());
        let http_port = env_parse("BAZAAR_HTTP_PORT", Self::DEFAULT_HTTP_PORT);

        let sources = SourceEndpoints {
            jd: env_url("BAZAAR_SOURCE_JD_URL"),
            taobao: env_url("BAZAAR_SOURCE_TAOBAO_URL"),
            pdd: env_url("BAZAAR_SOURCE_PDD_URL"),
            ali1688: env_url("BAZAAR_SOURCE_ALI1688_URL"),
        };
        if sources.configured().is_empty() {
            warn!("No BAZAAR_SOURCE_*_URL configured, every search will be rejected");
        }

        Self {
            host,
            data_dir: std::env::var("BAZAAR_DATA_DIR")
                .unwrap_or_else(|_| Self::DEFAULT_DATA_DIR.to_string()),
            http_port,
            allowed_origins: std::env::var("BAZAAR_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            cache_ttl: Duration::from_secs(env_parse(
                "BAZAAR_CACHE_TTL_SECS",
                Self::DEFAULT_CACHE_TTL_SECS,
            )),
            sweep_interval: env_interval(
                "BAZAAR_SWEEP_INTERVAL_SECS",
                Self::DEFAULT_SWEEP_INTERVAL_SECS,
            ),
            archive_retention: Duration::from_secs(env_parse(
                "BAZAAR_ARCHIVE_RETENTION_SECS",
                Self::DEFAULT_ARCHIVE_RETENTION_SECS,
            )),
            archive_purge_interval: env_interval(
                "BAZAAR_ARCHIVE_PURGE_INTERVAL_SECS",
                Self::DEFAULT_ARCHIVE_PURGE_INTERVAL_SECS,
            ),
            sources,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    parse_or_default(name, std::env::var(name).ok().as_deref(), default)
}

fn parse_or_default<T: std::str::FromStr>(name: &str, raw: Option<&str>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{} has an unparseable value '{}', using default", name, raw);
            default
        }),
        None => default,
    }
}

fn env_interval(name: &str, default_secs: u64) -> Duration {
    interval_or_default(name, std::env::var(name).ok().as_deref(), default_secs)
}

/// Periodic tasks cannot tick at a zero period, so zero falls back to the default
fn interval_or_default(name: &str, raw: Option<&str>, default_secs: u64) -> Duration {
    match parse_or_default(name, raw, default_secs) {
        0 => {
            warn!("{} must be at least 1 second, using default", name);
            Duration::from_secs(default_secs)
        }
        secs => Duration::from_secs(secs),
    }
}

fn env_url(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_endpoints_skip_missing() {
        let endpoints = SourceEndpoints {
            jd: None,
            taobao: Some("http://127.0.0.1:9001/search".to_string()),
            pdd: None,
            ali1688: Some("http://127.0.0.1:9002/search".to_string()),
        };

        let configured = endpoints.configured();
        assert_eq!(configured.len(), 2);
        assert_eq!(configured[0].0, "taobao");
        assert_eq!(configured[1], ("ali1688", "http://127.0.0.1:9002/search"));
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let name = "BAZAAR_SWEEP_INTERVAL_SECS";

        assert_eq!(interval_or_default(name, Some("0"), 60), Duration::from_secs(60));
        assert_eq!(interval_or_default(name, Some(" 0 "), 60), Duration::from_secs(60));
        assert_eq!(interval_or_default(name, Some("-5"), 60), Duration::from_secs(60));
        assert_eq!(interval_or_default(name, None, 60), Duration::from_secs(60));
        assert_eq!(interval_or_default(name, Some("15"), 60), Duration::from_secs(15));
    }
}
