//! Reconnecting SSE subscription to `GET /api/v1/events/stream`.

use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use hydrowatch_types::error::BusError;
use hydrowatch_types::event::StationEvent;
use reqwest_eventsource::{Event, EventSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{endpoint, parse_base_url};

/// Delay before reopening a dropped event stream.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Decode one SSE `data` payload. Unknown or malformed payloads yield `None`.
pub fn decode_event(data: &str) -> Option<StationEvent> {
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "skipping undecodable event");
            None
        }
    }
}

/// Subscribe to every event the control service at `base_url` broadcasts.
///
/// The stream survives server restarts: on any error it closes the source,
/// waits [`RECONNECT_DELAY`] and opens a new one. It ends only when
/// `cancel` fires. Events broadcast while disconnected are missed.
pub fn subscribe_events(
    base_url: &str,
    cancel: CancellationToken,
) -> Result<Pin<Box<dyn Stream<Item = StationEvent> + Send + 'static>>, BusError> {
    let base = parse_base_url(base_url).map_err(BusError::Connect)?;
    let url = endpoint(&base, &["api", "v1", "events", "stream"]);
    // No overall timeout: the stream is long-lived.
    let client = reqwest::Client::new();

    Ok(Box::pin(async_stream::stream! {
        loop {
            let mut source = match EventSource::new(client.get(url.clone())) {
                Ok(source) => source,
                Err(e) => {
                    warn!(error = %e, "cannot open event stream");
                    break;
                }
            };

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        source.close();
                        return;
                    }
                    next = source.next() => next,
                };

                match next {
                    Some(Ok(Event::Open)) => debug!(%url, "event stream open"),
                    Some(Ok(Event::Message(message))) => {
                        if let Some(event) = decode_event(&message.data) {
                            yield event;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream failed, reconnecting");
                        source.close();
                        break;
                    }
                    None => break,
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrowatch_types::station::StationId;

    #[test]
    fn decode_known_and_unknown_payloads() {
        let event = decode_event(r#"{"type":"issue","station_id":"S1","issue_type":"High Pollution detected","timestamp":1.5}"#);
        assert!(matches!(
            event,
            Some(StationEvent::IssueReported { station_id, .. }) if station_id == StationId::from("S1")
        ));
        assert!(decode_event(r#"{"type":"pong"}"#).is_none());
        assert!(decode_event("not json").is_none());
    }

    #[tokio::test]
    async fn cancelled_subscription_ends() {
        let cancel = CancellationToken::new();
        let mut stream = subscribe_events("http://127.0.0.1:9", cancel.clone()).unwrap();
        cancel.cancel();

        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
