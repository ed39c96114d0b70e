use crate::state::AppState;
use axum::{
    extract::State,
    http::Uri,
    response::sse::{Event, KeepAlive, Sse},
};
use bazaar::domain::Platform;
use bazaar::events::SearchEvent;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventFilter {
    platforms: Vec<Platform>,
    event_type: Vec<String>,
}

impl EventFilter {
    /// Parse query string with CSV support for multiple values
    /// Examples: ?platform=jd,pdd&type=started,completed
    fn from_query_string(query: &str) -> Self {
        let mut platforms = Vec::new();
        let mut event_type = Vec::new();

        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                match key {
                    "platform" => {
                        platforms.extend(value.split(',').filter_map(|s| s.parse::<Platform>().ok()));
                    }
                    "type" => {
                        event_type.extend(
                            value
                                .split(',')
                                .map(|s| s.trim().to_lowercase())
                                .filter(|s| !s.is_empty()),
                        );
                    }
                    _ => {}
                }
            }
        }

        Self {
            platforms,
            event_type,
        }
    }

    fn matches(&self, event: &SearchEvent) -> bool {
        if !self.platforms.is_empty() && !self.platforms.iter().any(|p| event.involves(*p)) {
            return false;
        }

        if !self.event_type.is_empty() && !self.event_type.iter().any(|t| t == event.kind()) {
            return false;
        }

        true
    }
}

/// SSE endpoint that streams search lifecycle events to clients
pub async fn stream_events(
    State(state): State<AppState>,
    uri: Uri,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = uri
        .query()
        .map(EventFilter::from_query_string)
        .unwrap_or_default();

    tracing::info!(
        "New SSE client connected. Filters: platform={:?}, type={:?}",
        filter.platforms,
        filter.event_type
    );

    let rx = state.event_channel.subscribe();
    let stream = BroadcastStream::new(rx);

    let filtered_stream = stream.filter_map(move |result| {
        let filter = filter.clone();
        async move {
            match result {
                Ok(event) => {
                    let send = filter.matches(&event);
                    tracing::debug!(
                        "Received event: request={}, kind={}, should_send={}",
                        event.request_id(),
                        event.kind(),
                        send
                    );
                    send.then(|| Ok::<_, Infallible>(to_sse_event(&event)))
                }
                Err(BroadcastStreamRecvError::Lagged(n)) => Some(Ok(Event::default()
                    .event("error")
                    .data(format!("Lagged by {} events", n)))),
            }
        }
    });

    Sse::new(filtered_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert a SearchEvent to an SSE Event named `search.<kind>`
fn to_sse_event(event: &SearchEvent) -> Event {
    let name = format!("search.{}", event.kind());
    Event::default()
        .event(name)
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar::domain::SourceOutcome;
    use bazaar::events::{PlatformSettledEvent, SearchCompletedEvent};

    fn settled(platform: Platform) -> SearchEvent {
        SearchEvent::PlatformSettled(PlatformSettledEvent {
            request_id: "req_1".into(),
            platform,
            outcome: SourceOutcome::Completed,
            item_count: 3,
            elapsed_ms: 120,
            timestamp: 1,
        })
    }

    fn completed() -> SearchEvent {
        SearchEvent::Completed(SearchCompletedEvent {
            request_id: "req_1".into(),
            keyword: "lamp".into(),
            platforms: vec![Platform::Jd, Platform::Taobao],
            requested_platforms: 2,
            successful_platforms: 2,
            total_items: 6,
            from_cache: false,
            elapsed_ms: 300,
            timestamp: 1,
        })
    }

    #[test]
    fn test_filter_parses_csv_values() {
        let filter = EventFilter::from_query_string("platform=jd,TAOBAO,ebay&type=settled,&x=1");

        assert_eq!(filter.platforms, vec![Platform::Jd, Platform::Taobao]);
        assert_eq!(filter.event_type, vec!["settled".to_string()]);
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = EventFilter::default();
        assert!(filter.matches(&settled(Platform::Pdd)));
        assert!(filter.matches(&completed()));
    }

    #[test]
    fn test_filter_by_platform_and_type() {
        let filter = EventFilter::from_query_string("platform=taobao");
        assert!(filter.matches(&settled(Platform::Taobao)));
        assert!(!filter.matches(&settled(Platform::Pdd)));
        assert!(filter.matches(&completed()));

        let filter = EventFilter::from_query_string("type=completed");
        assert!(!filter.matches(&settled(Platform::Taobao)));
        assert!(filter.matches(&completed()));
    }
}
