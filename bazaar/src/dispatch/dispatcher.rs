use crate::dispatch::fan_out::settle_all;
use crate::domain::{AggregatedResult, DEFAULT_CACHE_TTL, Platform, PlatformResult, SearchSpec};
use crate::events::{
    PlatformSettledEvent, SearchCompletedEvent, SearchEvent, SearchStartedEvent, now_timestamp,
};
use crate::keys::derive_key;
use crate::ports::{CacheStore, ResultArchive, SourceAdapter};
use shared::{Error, Result, TtlMs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type ResultCache = dyn CacheStore<String, AggregatedResult>;

/// Fans a search out to every requested source, joins on all of them and
/// caches results that found something.
pub struct Dispatcher {
    sources: HashMap<Platform, Arc<dyn SourceAdapter>>,
    cache: Arc<ResultCache>,
    archive: Option<Arc<dyn ResultArchive>>,
    event_broadcaster: Option<broadcast::Sender<SearchEvent>>,
    cache_ttl: TtlMs,
}

impl Dispatcher {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self {
            sources: HashMap::new(),
            cache,
            archive: None,
            event_broadcaster: None,
            cache_ttl: TtlMs::from(DEFAULT_CACHE_TTL),
        }
    }

    /// Register the adapter for its platform, replacing any earlier one
    pub fn with_source(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.sources.insert(adapter.platform(), adapter);
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ResultArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_event_broadcaster(mut self, broadcaster: broadcast::Sender<SearchEvent>) -> Self {
        self.event_broadcaster = Some(broadcaster);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = TtlMs::from(ttl);
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn configured_platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.sources.keys().copied().collect();
        platforms.sort();
        platforms
    }

    /// Serve `spec` from cache or by asking every requested source.
    ///
    /// Only an unconfigured platform fails the call. Source errors and
    /// timeouts end up inside the returned result.
    pub async fn run(&self, spec: &SearchSpec) -> Result<AggregatedResult> {
        let started = Instant::now();
        let request_id = generate_request_id();
        let sources = self.resolve_sources(spec.platforms())?;
        let key = derive_key(spec.keyword(), spec.platforms(), spec.limit());

        info!(
            "[{}] search '{}' platforms=[{}] limit={}",
            request_id,
            spec.keyword(),
            join_ids(spec.platforms()),
            spec.limit()
        );

        match self.cache.get(&key).await {
            Ok(Some(mut cached)) => {
                info!("[{}] cache hit for '{}'", request_id, spec.keyword());
                cached.from_cache = true;
                cached.request_id = request_id;
                self.emit_completed(&cached, started.elapsed());
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!("[{}] cache read failed, treating as miss: {}", request_id, e),
        }

        self.emit(SearchEvent::Started(SearchStartedEvent {
            request_id: request_id.clone(),
            keyword: spec.keyword().to_string(),
            platforms: spec.platforms().to_vec(),
            limit: spec.limit(),
            timestamp: now_timestamp(),
        }));

        let results = settle_all(
            sources,
            spec.keyword(),
            spec.limit(),
            spec.per_source_timeout(),
            |result| self.on_platform_settled(&request_id, result),
        )
        .await;

        let result = AggregatedResult::assemble(
            request_id,
            spec.keyword(),
            spec.platforms().len(),
            results,
            started.elapsed(),
        );

        if result.total_item_count > 0 {
            self.store(&key, &result).await;
        }

        info!(
            "[{}] search finished in {}ms, {}/{} platforms ok, {} items",
            result.request_id,
            result.elapsed.as_millis(),
            result.successful_platform_count,
            result.requested_platform_count,
            result.total_item_count
        );
        self.emit_completed(&result, result.elapsed);

        Ok(result)
    }

    fn resolve_sources(&self, platforms: &[Platform]) -> Result<Vec<(Platform, Arc<dyn SourceAdapter>)>> {
        platforms
            .iter()
            .map(|platform| {
                self.sources
                    .get(platform)
                    .map(|adapter| (*platform, Arc::clone(adapter)))
                    .ok_or_else(|| Error::PlatformNotConfigured(platform.to_string()))
            })
            .collect()
    }

    async fn store(&self, key: &str, result: &AggregatedResult) {
        match self
            .cache
            .set(key.to_string(), result.clone(), self.cache_ttl)
            .await
        {
            Ok(_) => debug!("[{}] cached under {}", result.request_id, key),
            Err(e) => warn!("[{}] skipping cache write: {}", result.request_id, e),
        }

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.record(key, result).await {
                warn!("[{}] archive write failed: {}", result.request_id, e);
            }
        }
    }

    fn on_platform_settled(&self, request_id: &str, result: &PlatformResult) {
        debug!(
            "[{}] {} settled: {} ({} items, {}ms){}",
            request_id,
            result.platform,
            result.outcome.as_str(),
            result.items.len(),
            result.elapsed.as_millis(),
            result
                .error
                .as_deref()
                .map(|e| format!(" error: {}", e))
                .unwrap_or_default()
        );

        self.emit(SearchEvent::PlatformSettled(PlatformSettledEvent {
            request_id: request_id.to_string(),
            platform: result.platform,
            outcome: result.outcome,
            item_count: result.items.len(),
            elapsed_ms: result.elapsed.as_millis() as u64,
            timestamp: now_timestamp(),
        }));
    }

    fn emit_completed(&self, result: &AggregatedResult, elapsed: Duration) {
        self.emit(SearchEvent::Completed(SearchCompletedEvent {
            request_id: result.request_id.clone(),
            keyword: result.keyword.clone(),
            platforms: result.platforms(),
            requested_platforms: result.requested_platform_count,
            successful_platforms: result.successful_platform_count,
            total_items: result.total_item_count,
            from_cache: result.from_cache,
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: now_timestamp(),
        }));
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(ref broadcaster) = self.event_broadcaster {
            let kind = event.kind();
            match broadcaster.send(event) {
                Ok(subscriber_count) => {
                    debug!("Broadcasted {} event to {} subscriber(s)", kind, subscriber_count)
                }
                Err(_) => debug!("No subscribers for {} event", kind),
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sources", &self.configured_platforms())
            .field("archive", &self.archive.is_some())
            .field("cache_ttl_ms", &self.cache_ttl.0)
            .finish()
    }
}

fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

fn join_ids(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
