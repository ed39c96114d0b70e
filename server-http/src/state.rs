use crate::sources::remote_sources;
use bazaar::domain::AggregatedResult;
use bazaar::events::SearchEvent;
use bazaar::ports::ResultArchive;
use bazaar::Dispatcher;
use shared::config::Config;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage_engine::{SledArchive, TtlCache};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const MIN_PURGE_INTERVAL: Duration = Duration::from_secs(1);

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub archive: Option<Arc<dyn ResultArchive>>,
    pub event_channel: broadcast::Sender<SearchEvent>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the cache, archive, event channel and remote sources from `config`.
    /// Must run inside a tokio runtime, the cache spawns its sweeper.
    pub fn new(config: &Config) -> Self {
        let cache: Arc<TtlCache<String, AggregatedResult>> =
            Arc::new(TtlCache::new(config.sweep_interval));

        // Fall back to cache-only mode if the archive can't be opened
        let archive = Self::init_archive(&config.data_dir);

        let (event_tx, _event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut dispatcher = Dispatcher::new(cache)
            .with_cache_ttl(config.cache_ttl)
            .with_event_broadcaster(event_tx.clone());
        for source in remote_sources(&config.sources) {
            info!("Registered source {}", source.platform());
            dispatcher = dispatcher.with_source(source);
        }
        if let Some(archive) = &archive {
            dispatcher = dispatcher.with_archive(Arc::clone(archive));
        }

        Self::from_parts(dispatcher, archive, event_tx)
    }

    pub fn from_parts(
        dispatcher: Dispatcher,
        archive: Option<Arc<dyn ResultArchive>>,
        event_channel: broadcast::Sender<SearchEvent>,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            archive,
            event_channel,
            started_at: Instant::now(),
        }
    }

    fn init_archive(data_dir: &str) -> Option<Arc<dyn ResultArchive>> {
        let path = Path::new(data_dir).join("archive.sled");

        match SledArchive::new(&path) {
            Ok(archive) => {
                info!("Result archive opened at {}", path.display());
                Some(Arc::new(archive))
            }
            Err(e) => {
                warn!("Failed to open result archive: {}. Running cache-only.", e);
                None
            }
        }
    }
}

/// Periodically drop archive records older than `retention`
pub fn spawn_archive_purge(
    archive: Arc<dyn ResultArchive>,
    retention: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(MIN_PURGE_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match archive.purge_expired(retention).await {
                Ok(0) => debug!("Archive purge found nothing to remove"),
                Ok(n) => info!("Archive purge removed {} record(s)", n),
                Err(e) => warn!("Archive purge failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bazaar::domain::ArchivedResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingArchive {
        purges: AtomicUsize,
    }

    #[async_trait]
    impl ResultArchive for CountingArchive {
        async fn record(&self, _key: &str, _result: &AggregatedResult) -> shared::Result<()> {
            Ok(())
        }

        async fn fetch(&self, _key: &str) -> shared::Result<Option<ArchivedResult>> {
            Ok(None)
        }

        async fn purge_expired(&self, _retention: Duration) -> shared::Result<usize> {
            self.purges.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_runs_on_every_interval() {
        let archive = Arc::new(CountingArchive::default());
        let handle = spawn_archive_purge(
            archive.clone(),
            Duration::from_secs(300),
            Duration::from_secs(600),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(archive.purges.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(1200)).await;
        assert_eq!(archive.purges.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_purge_interval_is_raised_to_a_second() {
        let archive = Arc::new(CountingArchive::default());
        let handle = spawn_archive_purge(archive.clone(), Duration::from_secs(300), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert!(!handle.is_finished());
        assert_eq!(archive.purges.load(Ordering::SeqCst), 3);
        handle.abort();
    }
}
