use crate::domain::{AggregatedResult, ArchivedResult, CacheStats, EntryInfo, Platform, SourceResponse};
use async_trait::async_trait;
use shared::{Result, TtlMs};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Ports are the pluggable seams between the dispatcher and the outside world

/// One marketplace lookup. Implementations should stop work once `cancel` fires;
/// the dispatcher cancels it when the per-source timeout wins the race.
#[async_trait]
pub trait SourceAdapter: Send + Sync + 'static {
    fn platform(&self) -> Platform;

    async fn search(
        &self,
        keyword: &str,
        limit: u32,
        cancel: CancellationToken,
    ) -> Result<SourceResponse>;
}

/// Keyed store with per-entry TTL
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync + 'static {
    /// Insert or overwrite, resetting the entry's age
    async fn set(&self, key: K, val: V, ttl: TtlMs) -> Result<bool>;

    /// Insert only when no live entry exists for `key`
    async fn set_if_absent(&self, key: K, val: V, ttl: TtlMs) -> Result<bool>;

    async fn get(&self, key: &K) -> Result<Option<V>>;

    async fn has(&self, key: &K) -> Result<bool>;

    async fn delete(&self, key: &K) -> Result<bool>;

    /// Give a live entry a new TTL starting now
    async fn update_ttl(&self, key: &K, ttl: TtlMs) -> Result<bool>;

    /// Remove everything, returning how many entries were dropped
    async fn clear(&self) -> Result<usize>;

    async fn keys(&self) -> Result<Vec<K>>;

    async fn entries(&self) -> Result<Vec<EntryInfo<K>>>;

    fn stats(&self) -> CacheStats;

    fn reset_stats(&self);
}

/// Durable writer for results worth keeping beyond the in-memory TTL
#[async_trait]
pub trait ResultArchive: Send + Sync + 'static {
    async fn record(&self, key: &str, result: &AggregatedResult) -> Result<()>;

    async fn fetch(&self, key: &str) -> Result<Option<ArchivedResult>>;

    /// Drop records older than `retention`, returning how many went
    async fn purge_expired(&self, retention: Duration) -> Result<usize>;
}
