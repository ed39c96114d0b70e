use crate::domain::{Platform, PlatformResult};
use crate::ports::SourceAdapter;
use futures::FutureExt;
use shared::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Run every adapter concurrently, each raced against its own timer, and wait
/// for all of them to settle. `on_settled` sees each result as it arrives.
pub(crate) async fn settle_all<F>(
    sources: Vec<(Platform, Arc<dyn SourceAdapter>)>,
    keyword: &str,
    limit: u32,
    timeout: Duration,
    mut on_settled: F,
) -> Vec<PlatformResult>
where
    F: FnMut(&PlatformResult),
{
    let requested: Vec<Platform> = sources.iter().map(|(p, _)| *p).collect();
    let mut tasks = JoinSet::new();

    for (platform, adapter) in sources {
        let keyword = keyword.to_string();
        tasks.spawn(race_platform(platform, adapter, keyword, limit, timeout));
    }

    let mut results = Vec::with_capacity(requested.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                on_settled(&result);
                results.push(result);
            }
            Err(e) => tracing::warn!("Platform task did not finish: {}", e),
        }
    }

    // a task that never reported still owes its platform a slot
    for platform in requested {
        if !results.iter().any(|r| r.platform == platform) {
            let result = PlatformResult::errored(
                platform,
                format!("{} search task aborted", platform),
                Duration::ZERO,
            );
            on_settled(&result);
            results.push(result);
        }
    }

    results
}

async fn race_platform(
    platform: Platform,
    adapter: Arc<dyn SourceAdapter>,
    keyword: String,
    limit: u32,
    timeout: Duration,
) -> PlatformResult {
    let started = Instant::now();
    let cancel = CancellationToken::new();
    let search = AssertUnwindSafe(adapter.search(&keyword, limit, cancel.clone())).catch_unwind();

    tokio::select! {
        biased;

        outcome = search => {
            let elapsed = started.elapsed();
            match outcome {
                Ok(Ok(response)) => PlatformResult::completed(platform, response, elapsed),
                Ok(Err(Error::Source(message))) => PlatformResult::errored(platform, message, elapsed),
                Ok(Err(e)) => PlatformResult::errored(platform, e.to_string(), elapsed),
                Err(_) => PlatformResult::errored(
                    platform,
                    format!("{} adapter panicked", platform),
                    elapsed,
                ),
            }
        }
        _ = tokio::time::sleep(timeout) => {
            // the adapter future is dropped here, the token reaches anything it spawned
            cancel.cancel();
            PlatformResult::timed_out(platform, timeout)
        }
    }
}
