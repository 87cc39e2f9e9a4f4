//! HttpControlClient -- [`ControlPlane`] over the control service REST routes.

use std::time::Duration;

use hydrowatch_core::control::ControlPlane;
use hydrowatch_types::error::ControlError;
use hydrowatch_types::rpc::{
    AddNeighborRequest, IssueReport, NeighborList, NeighborNotification, QualityDataResponse,
    RegisterStationRequest, StationSummary, StatusResponse,
};
use hydrowatch_types::station::StationId;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::{endpoint, envelope, parse_base_url};

/// Client for the control service at `base_url`.
///
/// Every request carries the configured timeout; an elapsed timeout
/// surfaces as [`ControlError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpControlClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ControlError> {
        let base_url = parse_base_url(base_url).map_err(ControlError::Transport)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControlError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn station_url(&self, station_id: &StationId, tail: &[&str]) -> Url {
        let mut segments = vec!["api", "v1", "stations", station_id.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ControlError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        envelope::decode(status, &body)
    }
}

fn transport_error(e: reqwest::Error) -> ControlError {
    if e.is_timeout() {
        ControlError::Timeout
    } else {
        ControlError::Transport(e.to_string())
    }
}

impl ControlPlane for HttpControlClient {
    async fn register(
        &self,
        station_id: &StationId,
        sensors: &[String],
    ) -> Result<StatusResponse, ControlError> {
        let url = endpoint(&self.base_url, &["api", "v1", "stations"]);
        let body = RegisterStationRequest {
            station_id: station_id.clone(),
            sensors: sensors.to_vec(),
        };
        self.send(self.client.post(url).json(&body)).await
    }

    async fn quality_data(
        &self,
        station_id: &StationId,
    ) -> Result<QualityDataResponse, ControlError> {
        self.send(self.client.get(self.station_url(station_id, &[])))
            .await
    }

    async fn neighbors(&self, station_id: &StationId) -> Result<Vec<StationId>, ControlError> {
        let list: NeighborList = self
            .send(self.client.get(self.station_url(station_id, &["neighbors"])))
            .await?;
        Ok(list.neighbors)
    }

    async fn add_neighbor(
        &self,
        station_id: &StationId,
        neighbor_id: &StationId,
    ) -> Result<StatusResponse, ControlError> {
        let body = AddNeighborRequest {
            neighbour_id: neighbor_id.clone(),
        };
        self.send(
            self.client
                .post(self.station_url(station_id, &["neighbors"]))
                .json(&body),
        )
        .await
    }

    async fn report_issue(
        &self,
        station_id: &StationId,
        issue_type: &str,
        timestamp: f64,
    ) -> Result<StatusResponse, ControlError> {
        let body = IssueReport {
            issue_type: issue_type.to_string(),
            timestamp,
        };
        self.send(
            self.client
                .post(self.station_url(station_id, &["issues"]))
                .json(&body),
        )
        .await
    }

    async fn notify_neighbors(
        &self,
        station_id: &StationId,
        issue_type: &str,
    ) -> Result<StatusResponse, ControlError> {
        let body = NeighborNotification {
            issue_type: issue_type.to_string(),
        };
        self.send(
            self.client
                .post(self.station_url(station_id, &["notify"]))
                .json(&body),
        )
        .await
    }

    async fn list_stations(&self) -> Result<Vec<StationSummary>, ControlError> {
        let url = endpoint(&self.base_url, &["api", "v1", "stations"]);
        self.send(self.client.get(url)).await
    }
}
