use async_trait::async_trait;
use bazaar::domain::{Platform, SourceResponse};
use bazaar::ports::SourceAdapter;
use reqwest::Client;
use shared::config::SourceEndpoints;
use shared::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Source adapter that asks an external scraper service over HTTP.
///
/// The service answers `GET {base_url}?keyword=..&limit=..` with
/// `{success, items | products, error}`.
pub struct RemoteSource {
    platform: Platform,
    base_url: String,
    client: Client,
}

impl RemoteSource {
    pub fn new(platform: Platform, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            platform,
            base_url: base_url.into(),
            client,
        }
    }

    async fn fetch(&self, keyword: &str, limit: u32) -> Result<SourceResponse> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("keyword", keyword), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| Error::Source(format!("{} request failed: {}", self.platform, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Source(format!(
                "{} responded with HTTP {}",
                self.platform, status
            )));
        }

        response.json::<SourceResponse>().await.map_err(|e| {
            Error::Source(format!("{} sent an unreadable body: {}", self.platform, e))
        })
    }
}

#[async_trait]
impl SourceAdapter for RemoteSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn search(
        &self,
        keyword: &str,
        limit: u32,
        cancel: CancellationToken,
    ) -> Result<SourceResponse> {
        debug!("{} -> {} keyword='{}' limit={}", self.platform, self.base_url, keyword, limit);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                Err(Error::Source(format!("{} search cancelled", self.platform)))
            }
            result = self.fetch(keyword, limit) => result,
        }
    }
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("platform", &self.platform)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// One RemoteSource per configured endpoint, sharing a single HTTP client
pub fn remote_sources(endpoints: &SourceEndpoints) -> Vec<Arc<dyn SourceAdapter>> {
    let client = Client::new();

    endpoints
        .configured()
        .into_iter()
        .filter_map(|(id, url)| match id.parse::<Platform>() {
            Ok(platform) => {
                Some(Arc::new(RemoteSource::new(platform, url, client.clone())) as Arc<dyn SourceAdapter>)
            }
            Err(e) => {
                warn!("Skipping source endpoint {}: {}", url, e);
                None
            }
        })
        .collect()
}
