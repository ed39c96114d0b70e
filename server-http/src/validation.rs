use bazaar::domain::{
    Platform, SearchSpec, MAX_KEYWORD_CHARS, MAX_LIMIT, MAX_SOURCE_TIMEOUT, MIN_KEYWORD_CHARS,
    MIN_LIMIT, MIN_SOURCE_TIMEOUT,
};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_LIMIT: u32 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Raw `/api/search` query. Numbers stay strings so junk falls back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub platforms: Option<String>,
    pub limit: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum ValidationError {
    InvalidKeyword,
    KeywordTooLong { chars: usize },
    InvalidPlatforms { unknown: Vec<String> },
    Rejected(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidKeyword => "INVALID_KEYWORD",
            ValidationError::KeywordTooLong { .. } => "KEYWORD_TOO_LONG",
            ValidationError::InvalidPlatforms { .. } => "INVALID_PLATFORMS",
            ValidationError::Rejected(_) => "INVALID_REQUEST",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidKeyword => write!(
                f,
                "Search keyword needs at least {} characters",
                MIN_KEYWORD_CHARS
            ),
            ValidationError::KeywordTooLong { chars } => write!(
                f,
                "Search keyword has {} characters, the maximum is {}",
                chars, MAX_KEYWORD_CHARS
            ),
            ValidationError::InvalidPlatforms { unknown } if unknown.is_empty() => {
                write!(f, "Specify at least one platform (jd, taobao, pdd, ali1688)")
            }
            ValidationError::InvalidPlatforms { unknown } => write!(
                f,
                "Unknown platform(s) '{}'. Must be jd, taobao, pdd or ali1688",
                unknown.join(",")
            ),
            ValidationError::Rejected(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for ValidationError {}

pub struct SearchSpecFactory;

impl SearchSpecFactory {
    /// Validates the query and returns a SearchSpec with defaults applied and numbers clamped
    pub fn from_query(query: &SearchQuery) -> Result<SearchSpec, ValidationError> {
        let keyword = Self::parse_keyword(query.keyword.as_deref())?;
        let platforms = Self::parse_platforms(query.platforms.as_deref())?;

        let limit = clamp_or_default(
            query.limit.as_deref(),
            DEFAULT_LIMIT as u64,
            MIN_LIMIT as u64,
            MAX_LIMIT as u64,
        ) as u32;
        let timeout_secs = clamp_or_default(
            query.timeout.as_deref(),
            DEFAULT_TIMEOUT_SECS,
            MIN_SOURCE_TIMEOUT.as_secs(),
            MAX_SOURCE_TIMEOUT.as_secs(),
        );

        SearchSpec::new(
            keyword,
            platforms,
            limit,
            Duration::from_secs(timeout_secs),
        )
        .map_err(|e| ValidationError::Rejected(e.to_string()))
    }

    fn parse_keyword(keyword: Option<&str>) -> Result<&str, ValidationError> {
        let keyword = keyword.map(str::trim).unwrap_or_default();
        let chars = keyword.chars().count();

        if chars < MIN_KEYWORD_CHARS {
            return Err(ValidationError::InvalidKeyword);
        }
        if chars > MAX_KEYWORD_CHARS {
            return Err(ValidationError::KeywordTooLong { chars });
        }
        Ok(keyword)
    }

    fn parse_platforms(platforms: Option<&str>) -> Result<Vec<Platform>, ValidationError> {
        let Some(raw) = platforms else {
            return Ok(Platform::ALL.to_vec());
        };

        let mut parsed = Vec::new();
        let mut unknown = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.parse::<Platform>() {
                Ok(platform) => parsed.push(platform),
                Err(_) => unknown.push(name.to_string()),
            }
        }

        if !unknown.is_empty() || parsed.is_empty() {
            return Err(ValidationError::InvalidPlatforms { unknown });
        }
        Ok(parsed)
    }
}

/// Zero, negative and unparseable values take the default, anything else is clamped
fn clamp_or_default(raw: Option<&str>, default: u64, min: u64, max: u64) -> u64 {
    let value = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u64)
        .unwrap_or(default);
    value.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(keyword: &str) -> SearchQuery {
        SearchQuery {
            keyword: Some(keyword.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_cover_every_platform() {
        let spec = SearchSpecFactory::from_query(&query("  phone case ")).unwrap();

        assert_eq!(spec.keyword(), "phone case");
        assert_eq!(spec.platforms(), &Platform::ALL);
        assert_eq!(spec.limit(), 5);
        assert_eq!(spec.per_source_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_numbers_are_clamped() {
        let mut q = query("phone");
        q.limit = Some("100".into());
        q.timeout = Some("2".into());
        let spec = SearchSpecFactory::from_query(&q).unwrap();
        assert_eq!(spec.limit(), 20);
        assert_eq!(spec.per_source_timeout(), Duration::from_secs(5));

        q.limit = Some("abc".into());
        q.timeout = Some("-3".into());
        let spec = SearchSpecFactory::from_query(&q).unwrap();
        assert_eq!(spec.limit(), 5);
        assert_eq!(spec.per_source_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_keyword_rules() {
        let err = SearchSpecFactory::from_query(&SearchQuery::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_KEYWORD");

        let err = SearchSpecFactory::from_query(&query(" a ")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidKeyword);

        let err = SearchSpecFactory::from_query(&query(&"x".repeat(51))).unwrap_err();
        assert_eq!(err, ValidationError::KeywordTooLong { chars: 51 });

        // counted in characters, not bytes
        assert!(SearchSpecFactory::from_query(&query(&"键".repeat(50))).is_ok());
    }

    #[test]
    fn test_platform_list_parsing() {
        let mut q = query("phone");
        q.platforms = Some("Taobao, jd,taobao,".into());
        let spec = SearchSpecFactory::from_query(&q).unwrap();
        assert_eq!(spec.platforms(), &[Platform::Taobao, Platform::Jd]);

        q.platforms = Some("jd,amazon".into());
        let err = SearchSpecFactory::from_query(&q).unwrap_err();
        assert_eq!(err.code(), "INVALID_PLATFORMS");
        assert!(err.to_string().contains("amazon"));

        q.platforms = Some(" , ".into());
        let err = SearchSpecFactory::from_query(&q).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidPlatforms {
                unknown: Vec::new()
            }
        );
    }
}
