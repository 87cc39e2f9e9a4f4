//! The control plane port.
//!
//! `ControlPlane` is the set of RPCs a station agent (or the CLI) can make
//! against the control service. Infra implements it over HTTP; the registry
//! handle implements it in-process, which is also what the HTTP handlers
//! call so both sides produce identical responses.

use std::future::Future;

use hydrowatch_types::error::ControlError;
use hydrowatch_types::issue::ReportOutcome;
use hydrowatch_types::rpc::{QualityDataResponse, StationSummary, StatusResponse};
use hydrowatch_types::station::StationId;

use crate::registry::{NeighborLink, RegistryHandle};

/// Remote procedure calls offered by the control service.
pub trait ControlPlane: Send + Sync {
    fn register(
        &self,
        station_id: &StationId,
        sensors: &[String],
    ) -> impl Future<Output = Result<StatusResponse, ControlError>> + Send;

    fn quality_data(
        &self,
        station_id: &StationId,
    ) -> impl Future<Output = Result<QualityDataResponse, ControlError>> + Send;

    fn neighbors(
        &self,
        station_id: &StationId,
    ) -> impl Future<Output = Result<Vec<StationId>, ControlError>> + Send;

    fn add_neighbor(
        &self,
        station_id: &StationId,
        neighbor_id: &StationId,
    ) -> impl Future<Output = Result<StatusResponse, ControlError>> + Send;

    /// `success == false` means the report was a duplicate.
    fn report_issue(
        &self,
        station_id: &StationId,
        issue_type: &str,
        timestamp: f64,
    ) -> impl Future<Output = Result<StatusResponse, ControlError>> + Send;

    /// Always succeeds unless the service itself is unavailable.
    fn notify_neighbors(
        &self,
        station_id: &StationId,
        issue_type: &str,
    ) -> impl Future<Output = Result<StatusResponse, ControlError>> + Send;

    fn list_stations(
        &self,
    ) -> impl Future<Output = Result<Vec<StationSummary>, ControlError>> + Send;
}

pub fn report_status(station_id: &StationId, outcome: ReportOutcome) -> StatusResponse {
    match outcome {
        ReportOutcome::Accepted => StatusResponse::ok(format!("Issue reported for {station_id}")),
        ReportOutcome::Duplicate => StatusResponse::rejected("Duplicate issue ignored"),
    }
}

pub fn neighbor_status(
    station_id: &StationId,
    neighbor_id: &StationId,
    link: NeighborLink,
) -> StatusResponse {
    match link {
        NeighborLink::Added => {
            StatusResponse::ok(format!("Neighbor {neighbor_id} added to {station_id}"))
        }
        NeighborLink::AlreadyPresent => StatusResponse::ok(format!(
            "{station_id} and {neighbor_id} are already neighbors"
        )),
    }
}

impl ControlPlane for RegistryHandle {
    async fn register(
        &self,
        station_id: &StationId,
        sensors: &[String],
    ) -> Result<StatusResponse, ControlError> {
        RegistryHandle::register(self, station_id.clone(), sensors.to_vec()).await?;
        Ok(StatusResponse::ok(format!("Station {station_id} registered")))
    }

    async fn quality_data(
        &self,
        station_id: &StationId,
    ) -> Result<QualityDataResponse, ControlError> {
        let station = self.get_station(station_id.clone()).await?;
        Ok(QualityDataResponse::from(&station))
    }

    async fn neighbors(&self, station_id: &StationId) -> Result<Vec<StationId>, ControlError> {
        Ok(RegistryHandle::neighbors(self, station_id.clone()).await?)
    }

    async fn add_neighbor(
        &self,
        station_id: &StationId,
        neighbor_id: &StationId,
    ) -> Result<StatusResponse, ControlError> {
        let link =
            RegistryHandle::add_neighbor(self, station_id.clone(), neighbor_id.clone()).await?;
        Ok(neighbor_status(station_id, neighbor_id, link))
    }

    async fn report_issue(
        &self,
        station_id: &StationId,
        issue_type: &str,
        timestamp: f64,
    ) -> Result<StatusResponse, ControlError> {
        let outcome = RegistryHandle::report_issue(
            self,
            station_id.clone(),
            issue_type.to_string(),
            timestamp,
        )
        .await?;
        Ok(report_status(station_id, outcome))
    }

    async fn notify_neighbors(
        &self,
        station_id: &StationId,
        issue_type: &str,
    ) -> Result<StatusResponse, ControlError> {
        let count =
            RegistryHandle::notify_neighbors(self, station_id.clone(), issue_type.to_string())
                .await?;
        Ok(StatusResponse::ok(format!(
            "Notified {count} neighbor(s) of {station_id}"
        )))
    }

    async fn list_stations(&self) -> Result<Vec<StationSummary>, ControlError> {
        let stations = RegistryHandle::list_stations(self).await?;
        Ok(stations.iter().map(StationSummary::from).collect())
    }
}
