//! Request and response bodies of the control service RPC surface.

use serde::{Deserialize, Serialize};

use crate::station::{QualityMetrics, Station, StationId, StationStatus};

/// Body of `POST /api/v1/stations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterStationRequest {
    pub station_id: StationId,
    /// Sensor ids attached to the station.
    #[serde(default)]
    pub sensors: Vec<String>,
}

/// Generic `{message, success}` outcome used by mutating RPCs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    pub success: bool,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

/// Response of `GET /api/v1/stations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDataResponse {
    pub station_id: StationId,
    pub ph: f64,
    pub turbidity: f64,
    pub pollutants: f64,
    pub status: StationStatus,
}

impl QualityDataResponse {
    pub fn metrics(&self) -> QualityMetrics {
        QualityMetrics {
            ph: self.ph,
            turbidity: self.turbidity,
            pollutants: self.pollutants,
        }
    }
}

impl From<&Station> for QualityDataResponse {
    fn from(station: &Station) -> Self {
        Self {
            station_id: station.id.clone(),
            ph: station.metrics.ph,
            turbidity: station.metrics.turbidity,
            pollutants: station.metrics.pollutants,
            status: station.status(),
        }
    }
}

/// Response of `GET /api/v1/stations/{id}/neighbors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborList {
    pub station_id: StationId,
    pub neighbors: Vec<StationId>,
}

/// Body of `POST /api/v1/stations/{id}/neighbors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNeighborRequest {
    #[serde(alias = "neighbor_id")]
    pub neighbour_id: StationId,
}

/// Body of `POST /api/v1/stations/{id}/issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueReport {
    pub issue_type: String,
    /// Float unix seconds at which the issue was observed.
    pub timestamp: f64,
}

/// Body of `POST /api/v1/stations/{id}/notify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborNotification {
    pub issue_type: String,
}

/// One row of `GET /api/v1/stations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub station_id: StationId,
    pub ph: f64,
    pub turbidity: f64,
    pub pollutants: f64,
    pub status: StationStatus,
    pub neighbors: Vec<StationId>,
    pub sensors: Vec<String>,
}

impl From<&Station> for StationSummary {
    fn from(station: &Station) -> Self {
        Self {
            station_id: station.id.clone(),
            ph: station.metrics.ph,
            turbidity: station.metrics.turbidity,
            pollutants: station.metrics.pollutants,
            status: station.status(),
            neighbors: station.neighbors.iter().cloned().collect(),
            sensors: station.sensors.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_neighbor_accepts_both_spellings() {
        let a: AddNeighborRequest = serde_json::from_str(r#"{"neighbour_id":"S2"}"#).unwrap();
        let b: AddNeighborRequest = serde_json::from_str(r#"{"neighbor_id":"S2"}"#).unwrap();
        assert_eq!(a.neighbour_id, b.neighbour_id);
    }

    #[test]
    fn test_register_request_sensors_default_empty() {
        let req: RegisterStationRequest = serde_json::from_str(r#"{"station_id":"S1"}"#).unwrap();
        assert!(req.sensors.is_empty());
    }

    #[test]
    fn test_quality_data_from_station() {
        let mut station = Station::new(StationId::from("S1"), Vec::new());
        station.metrics.pollutants = 95.0;
        let resp = QualityDataResponse::from(&station);
        assert_eq!(resp.pollutants, 95.0);
        assert_eq!(resp.status, StationStatus::Critical);
        assert_eq!(resp.metrics(), station.metrics);
    }
}
