//! HTTP relay transport for publishing station events.
//!
//! Connecting builds a fresh client and probes `/health`, so a dead control
//! service is detected before any event is sent. Each send is a
//! `POST /api/v1/events`.

use std::time::Duration;

use hydrowatch_core::event::{EventChannel, EventTransport};
use hydrowatch_types::error::BusError;
use hydrowatch_types::event::StationEvent;
use reqwest::Url;

use super::{endpoint, parse_base_url};

#[derive(Debug, Clone)]
pub struct HttpEventTransport {
    base_url: Url,
    timeout: Duration,
}

impl HttpEventTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BusError> {
        let base_url = parse_base_url(base_url).map_err(BusError::Connect)?;
        Ok(Self { base_url, timeout })
    }
}

#[derive(Debug)]
pub struct HttpEventChannel {
    client: reqwest::Client,
    events_url: Url,
}

impl EventTransport for HttpEventTransport {
    type Channel = HttpEventChannel;

    async fn connect(&self) -> Result<HttpEventChannel, BusError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BusError::Connect(e.to_string()))?;

        let health = endpoint(&self.base_url, &["health"]);
        let response = client
            .get(health)
            .send()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BusError::Connect(format!(
                "health check returned HTTP {}",
                response.status()
            )));
        }

        tracing::debug!(url = %self.base_url, "event relay connected");
        Ok(HttpEventChannel {
            client,
            events_url: endpoint(&self.base_url, &["api", "v1", "events"]),
        })
    }
}

impl EventChannel for HttpEventChannel {
    async fn send(&mut self, event: &StationEvent) -> Result<(), BusError> {
        let response = self
            .client
            .post(self.events_url.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| BusError::Send(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BusError::Send(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_dead_service_fails() {
        let transport =
            HttpEventTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            transport.connect().await,
            Err(BusError::Connect(_))
        ));
    }

    #[test]
    fn invalid_base_url_is_connect_error() {
        assert!(matches!(
            HttpEventTransport::new("nope", Duration::from_secs(1)),
            Err(BusError::Connect(_))
        ));
    }
}
