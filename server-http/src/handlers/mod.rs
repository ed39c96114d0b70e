pub mod archive;
pub mod cache;
pub mod events;
pub mod health;
pub mod search;

pub use archive::archived_result;
pub use cache::{cache_entries, cache_stats, clear_cache, reset_cache_stats};
pub use events::stream_events;
pub use health::health_check;
pub use search::search;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::state::AppState;
    use async_trait::async_trait;
    use bazaar::domain::{AggregatedResult, ArchivedResult, Platform, SourceResponse};
    use bazaar::ports::{ResultArchive, SourceAdapter};
    use bazaar::Dispatcher;
    use chrono::Utc;
    use serde_json::json;
    use shared::Result;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use storage_engine::TtlCache;
    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    pub struct StubSource {
        pub platform: Platform,
        pub items: usize,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StubSource {
        pub fn new(platform: Platform, items: usize, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                platform,
                items,
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for StubSource {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn search(
            &self,
            keyword: &str,
            _limit: u32,
            _cancel: CancellationToken,
        ) -> Result<SourceResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let items = (0..self.items)
                .map(|i| json!({"title": format!("{} #{}", keyword, i)}).into())
                .collect();
            Ok(SourceResponse::found(items))
        }
    }

    /// Keeps archived records in memory
    #[derive(Default)]
    pub struct MemoryArchive {
        records: Mutex<HashMap<String, ArchivedResult>>,
    }

    #[async_trait]
    impl ResultArchive for MemoryArchive {
        async fn record(&self, key: &str, result: &AggregatedResult) -> Result<()> {
            let record = ArchivedResult {
                key: key.to_string(),
                keyword: result.keyword.clone(),
                platforms: result.platforms(),
                stored_at_ms: Utc::now().timestamp_millis(),
                result: result.clone(),
            };
            self.records.lock().unwrap().insert(key.to_string(), record);
            Ok(())
        }

        async fn fetch(&self, key: &str) -> Result<Option<ArchivedResult>> {
            Ok(self.records.lock().unwrap().get(key).cloned())
        }

        async fn purge_expired(&self, _retention: Duration) -> Result<usize> {
            Ok(0)
        }
    }

    /// AppState over a real TtlCache with the given stub sources and no archive
    pub fn app_state(sources: Vec<Arc<StubSource>>) -> AppState {
        build(sources, None)
    }

    pub fn app_state_with_archive(sources: Vec<Arc<StubSource>>) -> AppState {
        build(sources, Some(Arc::new(MemoryArchive::default())))
    }

    fn build(sources: Vec<Arc<StubSource>>, archive: Option<Arc<dyn ResultArchive>>) -> AppState {
        let cache: Arc<TtlCache<String, AggregatedResult>> =
            Arc::new(TtlCache::new(Duration::from_secs(60)));
        let (event_tx, _) = broadcast::channel(64);

        let mut dispatcher = Dispatcher::new(cache).with_event_broadcaster(event_tx.clone());
        for source in sources {
            dispatcher = dispatcher.with_source(source);
        }
        if let Some(archive) = &archive {
            dispatcher = dispatcher.with_archive(Arc::clone(archive));
        }
        AppState::from_parts(dispatcher, archive, event_tx)
    }
}
