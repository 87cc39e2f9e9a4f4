//! Event types for the Hydrowatch event bus.
//!
//! `StationEvent` is the unified event type broadcast by the control
//! service. The JSON shape (the `type` tag values and snake_case field
//! names) is the wire contract toward dashboards and gateways, so variant
//! renames here are deliberate and must stay stable.

use serde::{Deserialize, Serialize};

use crate::station::{QualityMetrics, StationId};

/// Current wall-clock time as float unix seconds.
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// What happened to a neighbor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeighborAction {
    Added,
}

/// Events broadcast to every bus subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StationEvent {
    /// A station registered with the control service.
    StationRegistered { station_id: StationId, timestamp: f64 },

    /// A new neighbor edge was created (both directions).
    #[serde(rename = "neighbour_update")]
    NeighborAdded {
        station_id: StationId,
        neighbour_id: StationId,
        action: NeighborAction,
    },

    /// An issue report was accepted by the registry.
    #[serde(rename = "issue")]
    IssueReported {
        station_id: StationId,
        issue_type: String,
        timestamp: f64,
    },

    /// A neighbor of `origin_station` is being told about its issue.
    #[serde(rename = "neighbour_alert")]
    NeighborNotified {
        origin_station: StationId,
        target_station: StationId,
        issue_type: String,
        timestamp: f64,
    },

    /// A station's sensor fired an issue; carries the triggering reading.
    #[serde(rename = "alert")]
    SensorAlert {
        station_id: StationId,
        message: String,
        metrics: QualityMetrics,
        timestamp: f64,
    },

    /// Periodic liveness signal from a sensor.
    #[serde(rename = "sensor_status")]
    SensorHeartbeat {
        sensor_id: String,
        status: String,
        timestamp: f64,
    },
}

impl StationEvent {
    /// Wire tag of this event (the JSON `type` field).
    pub fn kind(&self) -> &'static str {
        match self {
            StationEvent::StationRegistered { .. } => "station_registered",
            StationEvent::NeighborAdded { .. } => "neighbour_update",
            StationEvent::IssueReported { .. } => "issue",
            StationEvent::NeighborNotified { .. } => "neighbour_alert",
            StationEvent::SensorAlert { .. } => "alert",
            StationEvent::SensorHeartbeat { .. } => "sensor_status",
        }
    }

    /// The station the event originates from, if any.
    pub fn station_id(&self) -> Option<&StationId> {
        match self {
            StationEvent::StationRegistered { station_id, .. }
            | StationEvent::NeighborAdded { station_id, .. }
            | StationEvent::IssueReported { station_id, .. }
            | StationEvent::SensorAlert { station_id, .. } => Some(station_id),
            StationEvent::NeighborNotified { origin_station, .. } => Some(origin_station),
            StationEvent::SensorHeartbeat { .. } => None,
        }
    }

    /// Whether stations may publish this event through the relay endpoint.
    ///
    /// Registry-owned events (registration, neighbor edges, accepted issues,
    /// neighbor alerts) are only ever emitted by the registry itself.
    pub fn is_station_originated(&self) -> bool {
        matches!(
            self,
            StationEvent::SensorAlert { .. } | StationEvent::SensorHeartbeat { .. }
        )
    }

    pub fn heartbeat(sensor_id: impl Into<String>) -> Self {
        StationEvent::SensorHeartbeat {
            sensor_id: sensor_id.into(),
            status: "alive".to_string(),
            timestamp: unix_timestamp(),
        }
    }
}
