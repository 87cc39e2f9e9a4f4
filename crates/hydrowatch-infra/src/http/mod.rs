//! HTTP adapters toward the control service.
//!
//! - `control_client`: `ControlPlane` over the `/api/v1` RPC routes
//! - `event_transport`: `EventTransport` over `POST /api/v1/events`
//! - `event_stream`: reconnecting SSE subscription to the event stream

pub mod control_client;
pub mod envelope;
pub mod event_stream;
pub mod event_transport;

pub use control_client::HttpControlClient;
pub use event_stream::subscribe_events;
pub use event_transport::HttpEventTransport;

use reqwest::Url;

/// Parse a base URL such as `http://127.0.0.1:50051`.
pub fn parse_base_url(base: &str) -> Result<Url, String> {
    let url = Url::parse(base).map_err(|e| format!("invalid URL '{base}': {e}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("'{base}' cannot be used as a base URL"));
    }
    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
