//! Sensor contract, threshold rules and the simulated sensor.

mod simulated;

pub use simulated::SimulatedSensor;

use hydrowatch_types::issue::Issue;
use hydrowatch_types::station::QualityMetrics;

/// A data source attached to a station.
pub trait Sensor: Send + Sync {
    /// Sensor id, `<station>-<n>`.
    fn id(&self) -> &str;

    /// Take one reading.
    fn sample(&self) -> QualityMetrics;
}

/// Limits beyond which a reading fires an issue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_pollutants: f64,
    pub min_ph: f64,
    pub max_ph: f64,
    pub max_turbidity: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_pollutants: 90.0,
            min_ph: 6.0,
            max_ph: 8.0,
            max_turbidity: 9.0,
        }
    }
}

impl Thresholds {
    /// Every issue the reading fires. The three rules are independent, so
    /// one reading can fire all of them.
    pub fn evaluate(&self, reading: &QualityMetrics) -> Vec<Issue> {
        let mut issues = Vec::new();
        if reading.pollutants > self.max_pollutants {
            issues.push(Issue::pollution());
        }
        if reading.ph < self.min_ph || reading.ph > self.max_ph {
            issues.push(Issue::acidity(reading.ph));
        }
        if reading.turbidity > self.max_turbidity {
            issues.push(Issue::turbidity(reading.turbidity));
        }
        issues
    }
}
