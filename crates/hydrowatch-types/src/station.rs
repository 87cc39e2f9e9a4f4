use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a monitoring station (e.g. "Station1").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank ids (empty or whitespace only) are never valid station ids.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Id of the `index`-th sensor attached to this station: `<station>-<index>`.
    pub fn sensor_id(&self, index: usize) -> String {
        format!("{}-{index}", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The three water-quality metrics tracked per station.
///
/// Also used as the raw reading produced by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Acidity index.
    pub ph: f64,
    pub turbidity: f64,
    /// Pollutant concentration.
    pub pollutants: f64,
}

impl QualityMetrics {
    pub const NEUTRAL_PH: f64 = 7.0;
    pub const NEUTRAL_TURBIDITY: f64 = 5.0;
    pub const NEUTRAL_POLLUTANTS: f64 = 0.0;

    pub fn status(&self) -> StationStatus {
        StationStatus::classify(self)
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            ph: Self::NEUTRAL_PH,
            turbidity: Self::NEUTRAL_TURBIDITY,
            pollutants: Self::NEUTRAL_POLLUTANTS,
        }
    }
}

/// A station as held by the control service registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub metrics: QualityMetrics,
    /// Symmetric neighbor relation; never contains `id`.
    pub neighbors: BTreeSet<StationId>,
    /// Ids of the sensors attached to this station.
    pub sensors: BTreeSet<String>,
    pub registered_at: DateTime<Utc>,
    /// Last time an issue report for this station was accepted.
    pub last_issue_at: Option<DateTime<Utc>>,
}

impl Station {
    /// Create a freshly registered station with neutral metrics.
    pub fn new(id: StationId, sensors: impl IntoIterator<Item = String>) -> Self {
        Self {
            id,
            metrics: QualityMetrics::default(),
            neighbors: BTreeSet::new(),
            sensors: sensors.into_iter().collect(),
            registered_at: Utc::now(),
            last_issue_at: None,
        }
    }

    pub fn status(&self) -> StationStatus {
        self.metrics.status()
    }
}

/// Health classification derived from a station's metrics.
///
/// - Critical: any metric outside its safe band
/// - Warning: pollutants or turbidity trending high
/// - Normal: everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Normal,
    Warning,
    Critical,
}

impl StationStatus {
    pub fn classify(metrics: &QualityMetrics) -> Self {
        if metrics.pollutants > 90.0
            || metrics.ph < 6.0
            || metrics.ph > 8.0
            || metrics.turbidity > 9.0
        {
            StationStatus::Critical
        } else if metrics.pollutants > 70.0 || metrics.turbidity > 7.0 {
            StationStatus::Warning
        } else {
            StationStatus::Normal
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationStatus::Normal => write!(f, "normal"),
            StationStatus::Warning => write!(f, "warning"),
            StationStatus::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for StationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(StationStatus::Normal),
            "warning" => Ok(StationStatus::Warning),
            "critical" => Ok(StationStatus::Critical),
            other => Err(format!("invalid station status: '{other}'")),
        }
    }
}
