//! Issue reports and their effect on station metrics.
//!
//! Issue types travel as free-form strings (e.g. "High Pollution detected",
//! "pH imbalance (4.5)"). The registry classifies them into an [`IssueKind`]
//! to decide which metric override to apply.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::station::QualityMetrics;

/// Pollutant level recorded after an accepted pollution report.
pub const ELEVATED_POLLUTANTS: f64 = 95.0;
/// Acidity recorded after a low-pH report.
pub const ACIDITY_LOW: f64 = 5.5;
/// Acidity recorded after a high-pH report.
pub const ACIDITY_HIGH: f64 = 8.5;
/// Turbidity recorded after an accepted turbidity report.
pub const ELEVATED_TURBIDITY: f64 = 9.5;

/// Neutral acidity; parenthesised readings below this are "low".
const PH_NEUTRAL: f64 = 7.0;

/// Which way an acidity reading left its safe band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcidityDirection {
    Low,
    High,
}

/// Category of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    Pollution,
    AcidityImbalance { direction: AcidityDirection },
    Turbidity,
    /// Unrecognised issue type; accepted but leaves metrics untouched.
    Other,
}

impl IssueKind {
    /// Classify a free-form issue type string (case-insensitive).
    pub fn classify(issue_type: &str) -> Self {
        let lower = issue_type.to_lowercase();

        if lower.contains("pollution") {
            return IssueKind::Pollution;
        }

        let mentions_ph = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "ph");
        if mentions_ph {
            let low = lower.contains("low")
                || parenthesised_value(&lower).is_some_and(|v| v < PH_NEUTRAL);
            let direction = if low {
                AcidityDirection::Low
            } else {
                AcidityDirection::High
            };
            return IssueKind::AcidityImbalance { direction };
        }

        if lower.contains("turbidity") || lower.contains("turbulence") {
            return IssueKind::Turbidity;
        }

        IssueKind::Other
    }

    /// Apply this issue's metric override.
    pub fn apply(&self, metrics: &mut QualityMetrics) {
        match self {
            IssueKind::Pollution => metrics.pollutants = ELEVATED_POLLUTANTS,
            IssueKind::AcidityImbalance { direction: AcidityDirection::Low } => {
                metrics.ph = ACIDITY_LOW
            }
            IssueKind::AcidityImbalance { direction: AcidityDirection::High } => {
                metrics.ph = ACIDITY_HIGH
            }
            IssueKind::Turbidity => metrics.turbidity = ELEVATED_TURBIDITY,
            IssueKind::Other => {}
        }
    }
}

/// First `(<number>)` group in the string, e.g. `4.5` in "ph imbalance (4.5)".
fn parenthesised_value(s: &str) -> Option<f64> {
    let open = s.find('(')?;
    let close = s[open..].find(')')? + open;
    s[open + 1..close].trim().parse().ok()
}

/// An issue fired by a sensor's threshold rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Human-readable issue type sent to the control service.
    pub description: String,
}

impl Issue {
    pub fn pollution() -> Self {
        Self {
            kind: IssueKind::Pollution,
            description: "High Pollution detected".to_string(),
        }
    }

    pub fn acidity(ph: f64) -> Self {
        let direction = if ph < PH_NEUTRAL {
            AcidityDirection::Low
        } else {
            AcidityDirection::High
        };
        Self {
            kind: IssueKind::AcidityImbalance { direction },
            description: format!("pH imbalance ({ph:.1})"),
        }
    }

    pub fn turbidity(turbidity: f64) -> Self {
        Self {
            kind: IssueKind::Turbidity,
            description: format!("High Turbidity ({turbidity:.1})"),
        }
    }
}

/// Result of an issue report that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportOutcome {
    /// First report in its dedup window; metrics and events were updated.
    Accepted,
    /// Already reported within the window; no side effects.
    Duplicate,
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutcome::Accepted => write!(f, "accepted"),
            ReportOutcome::Duplicate => write!(f, "duplicate"),
        }
    }
}
