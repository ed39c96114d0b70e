// shared/src/lib.rs

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    #[error("platform not configured: {0}")]
    PlatformNotConfigured(String),
    #[error("source: {0}")]
    Source(String),
    #[error("cache: {0}")]
    Cache(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller rather than by a source or the server
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput { .. } | Error::UnknownPlatform(_) | Error::PlatformNotConfigured(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

impl From<std::time::Duration> for TtlMs {
    fn from(d: std::time::Duration) -> Self {
        TtlMs(d.as_millis() as u64)
    }
}

pub mod config;
