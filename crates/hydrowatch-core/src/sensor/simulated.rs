use std::sync::Mutex;

use hydrowatch_types::station::QualityMetrics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Sensor;

/// Sensor producing random readings, occasionally anomalous.
///
/// Nominal readings stay inside `ph ∈ [6.0, 8.5)`, `turbidity ∈ [0, 10)`
/// and `pollutants ∈ [0, 100)`. An anomalous reading has an extreme pH and
/// turbidity and pollutants well above their thresholds.
pub struct SimulatedSensor {
    id: String,
    anomaly_probability: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedSensor {
    pub fn new(id: impl Into<String>, anomaly_probability: f64) -> Self {
        Self::with_rng(id, anomaly_probability, StdRng::from_entropy())
    }

    /// Deterministic sensor for reproducible runs.
    pub fn seeded(id: impl Into<String>, anomaly_probability: f64, seed: u64) -> Self {
        Self::with_rng(id, anomaly_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: impl Into<String>, anomaly_probability: f64, rng: StdRng) -> Self {
        Self {
            id: id.into(),
            anomaly_probability: anomaly_probability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl Sensor for SimulatedSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn sample(&self) -> QualityMetrics {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if rng.gen_bool(self.anomaly_probability) {
            let ph = if rng.gen_bool(0.5) { 4.5 } else { 9.5 };
            return QualityMetrics {
                ph,
                turbidity: rng.gen_range(9.0..15.0),
                pollutants: rng.gen_range(90.0..120.0),
            };
        }

        QualityMetrics {
            ph: rng.gen_range(6.0..8.5),
            turbidity: rng.gen_range(0.0..10.0),
            pollutants: rng.gen_range(0.0..100.0),
        }
    }
}
