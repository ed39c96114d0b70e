use async_trait::async_trait;
use bazaar::domain::{AggregatedResult, ArchivedResult};
use bazaar::ports::ResultArchive;
use chrono::Utc;
use shared::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const RESULTS_TREE: &str = "results";

/// Sled-backed archive of cache-worthy search results
pub struct SledArchive {
    db: sled::Db,
    results: sled::Tree,
}

impl SledArchive {
    /// Open (or create) the archive at `path`, creating parent directories as needed
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open Sled database: {}", e)))?;
        let results = db
            .open_tree(RESULTS_TREE)
            .map_err(|e| Error::Storage(format!("Failed to open results tree: {}", e)))?;

        Ok(Self { db, results })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    async fn write(&self, record: &ArchivedResult) -> Result<()> {
        let value = serde_json::to_vec(record)
            .map_err(|e| Error::Storage(format!("Failed to serialize result: {}", e)))?;

        self.results
            .insert(record.key.as_bytes(), value)
            .map_err(|e| Error::Storage(format!("Failed to save result: {}", e)))?;

        self.flush().await
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    async fn record_at(
        &self,
        key: &str,
        result: &AggregatedResult,
        stored_at_ms: i64,
    ) -> Result<()> {
        let record = ArchivedResult {
            key: key.to_string(),
            keyword: result.keyword.clone(),
            platforms: result.platforms(),
            stored_at_ms,
            result: result.clone(),
        };
        self.write(&record).await
    }
}

#[async_trait]
impl ResultArchive for SledArchive {
    async fn record(&self, key: &str, result: &AggregatedResult) -> Result<()> {
        self.record_at(key, result, Utc::now().timestamp_millis())
            .await?;
        debug!("Archived result for '{}' under {}", result.keyword, key);
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<ArchivedResult>> {
        let value = self
            .results
            .get(key.as_bytes())
            .map_err(|e| Error::Storage(format!("Failed to get result: {}", e)))?;

        match value {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Storage(format!("Failed to deserialize result: {}", e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn purge_expired(&self, retention: Duration) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let retention_ms = retention.as_millis() as i64;
        let mut stale = Vec::new();

        for entry in self.results.iter() {
            let (key, value) = entry
                .map_err(|e| Error::Storage(format!("Failed to iterate database: {}", e)))?;

            match serde_json::from_slice::<ArchivedResult>(&value) {
                Ok(record) if now - record.stored_at_ms > retention_ms => stale.push(key),
                Ok(_) => {}
                Err(e) => {
                    // unreadable records are dropped along with the stale ones
                    warn!("Dropping corrupt archive record: {}", e);
                    stale.push(key);
                }
            }
        }

        for key in &stale {
            self.results
                .remove(key)
                .map_err(|e| Error::Storage(format!("Failed to delete result: {}", e)))?;
        }
        if !stale.is_empty() {
            self.flush().await?;
        }

        Ok(stale.len())
    }
}

impl std::fmt::Debug for SledArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledArchive")
            .field("records", &self.results.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar::domain::{Platform, PlatformResult, SourceResponse};
    use bazaar::keys::derive_key;
    use serde_json::json;

    fn sample_result() -> AggregatedResult {
        AggregatedResult::assemble(
            "req_test",
            "mechanical keyboard",
            2,
            vec![
                PlatformResult::completed(
                    Platform::Taobao,
                    SourceResponse::found(vec![json!({"title": "kb", "price": "199.00"}).into()]),
                    Duration::from_millis(900),
                ),
                PlatformResult::errored(Platform::Jd, "blocked", Duration::from_millis(4)),
            ],
            Duration::from_millis(905),
        )
    }

    #[tokio::test]
    async fn test_record_and_fetch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = SledArchive::new(temp_dir.path().join("archive.sled")).unwrap();
        let result = sample_result();
        let key = derive_key(&result.keyword, &result.platforms(), 5);

        archive.record(&key, &result).await.unwrap();

        let fetched = archive.fetch(&key).await.unwrap().unwrap();
        assert_eq!(fetched.key, key);
        assert_eq!(fetched.keyword, "mechanical keyboard");
        assert_eq!(fetched.platforms, vec![Platform::Jd, Platform::Taobao]);
        assert_eq!(fetched.result, result);

        assert!(archive.fetch("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_drops_old_and_corrupt_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = SledArchive::new(temp_dir.path().join("nested").join("archive.sled")).unwrap();
        let result = sample_result();
        let now = Utc::now().timestamp_millis();

        archive.record_at("fresh", &result, now).await.unwrap();
        archive
            .record_at("stale", &result, now - 10 * 60 * 1000)
            .await
            .unwrap();
        archive.results.insert("garbage", b"not json".to_vec()).unwrap();
        assert_eq!(archive.len(), 3);

        let purged = archive
            .purge_expired(Duration::from_secs(5 * 60))
            .await
            .unwrap();

        assert_eq!(purged, 2);
        assert_eq!(archive.len(), 1);
        assert!(archive.fetch("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("archive.sled");

        {
            let archive = SledArchive::new(&path).unwrap();
            archive.record("k1", &sample_result()).await.unwrap();
        }

        let reopened = SledArchive::new(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.fetch("k1").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_all_land() {
        let temp_dir = tempfile::tempdir().unwrap();
        let archive = std::sync::Arc::new(
            SledArchive::new(temp_dir.path().join("archive.sled")).unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let archive = archive.clone();
            handles.push(tokio::spawn(async move {
                archive
                    .record(&format!("k{}", i), &sample_result())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(archive.len(), 16);
        assert!(archive.fetch("k15").await.unwrap().is_some());
    }
}
