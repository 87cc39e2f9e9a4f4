//! Authoritative station map and neighbor graph.
//!
//! `StationRegistry` is plain synchronous state. It is owned by exactly one
//! registry actor task (see [`super::actor`]), which is what serializes
//! access. Every meaningful mutation appends an [`Outbound`] intent to the
//! outbox; the actor drains it after each command.

use std::collections::BTreeMap;

use chrono::Utc;
use hydrowatch_types::error::RegistryError;
use hydrowatch_types::event::{unix_timestamp, NeighborAction, StationEvent};
use hydrowatch_types::issue::{IssueKind, ReportOutcome};
use hydrowatch_types::station::{Station, StationId};
use tracing::debug;

use super::dedup::{DedupVerdict, DedupWindow};

/// Something the registry wants delivered after a command completes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Broadcast as-is.
    Event(StationEvent),
    /// Expanded into one `NeighborNotified` per target by the dispatcher.
    NotifyNeighbors {
        origin: StationId,
        issue_type: String,
        targets: Vec<StationId>,
    },
}

/// Result of a successful `add_neighbor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborLink {
    Added,
    AlreadyPresent,
}

#[derive(Debug)]
pub struct StationRegistry {
    stations: BTreeMap<StationId, Station>,
    dedup: DedupWindow,
    outbox: Vec<Outbound>,
}

impl StationRegistry {
    pub fn new(window_secs: u64, retention_windows: u64) -> Self {
        Self {
            stations: BTreeMap::new(),
            dedup: DedupWindow::new(window_secs, retention_windows),
            outbox: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        id: StationId,
        sensors: Vec<String>,
    ) -> Result<(), RegistryError> {
        if id.is_blank() {
            return Err(RegistryError::InvalidArgument(
                "station id must not be empty".to_string(),
            ));
        }
        if self.stations.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id.to_string()));
        }

        debug!(station_id = %id, sensors = sensors.len(), "station registered");
        self.stations
            .insert(id.clone(), Station::new(id.clone(), sensors));
        self.outbox.push(Outbound::Event(StationEvent::StationRegistered {
            station_id: id,
            timestamp: unix_timestamp(),
        }));
        Ok(())
    }

    pub fn get_station(&self, id: &StationId) -> Result<&Station, RegistryError> {
        self.stations
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Neighbor ids of `id`, sorted.
    pub fn neighbors(&self, id: &StationId) -> Result<Vec<StationId>, RegistryError> {
        Ok(self.get_station(id)?.neighbors.iter().cloned().collect())
    }

    /// Link two stations in both directions.
    ///
    /// Argument validation happens before the existence check, so a
    /// self-link is always `InvalidArgument`.
    pub fn add_neighbor(
        &mut self,
        id: &StationId,
        neighbor: &StationId,
    ) -> Result<NeighborLink, RegistryError> {
        if id.is_blank() || neighbor.is_blank() {
            return Err(RegistryError::InvalidArgument(
                "station ids must not be empty".to_string(),
            ));
        }
        if id == neighbor {
            return Err(RegistryError::InvalidArgument(format!(
                "station '{id}' cannot be its own neighbor"
            )));
        }
        for station in [id, neighbor] {
            if !self.stations.contains_key(station) {
                return Err(RegistryError::NotFound(station.to_string()));
            }
        }

        let mut added = false;
        if let Some(station) = self.stations.get_mut(id) {
            added |= station.neighbors.insert(neighbor.clone());
        }
        if let Some(station) = self.stations.get_mut(neighbor) {
            added |= station.neighbors.insert(id.clone());
        }

        if !added {
            return Ok(NeighborLink::AlreadyPresent);
        }

        debug!(station_id = %id, neighbor_id = %neighbor, "neighbor edge added");
        self.outbox.push(Outbound::Event(StationEvent::NeighborAdded {
            station_id: id.clone(),
            neighbour_id: neighbor.clone(),
            action: NeighborAction::Added,
        }));
        Ok(NeighborLink::Added)
    }

    /// Record an issue report observed at `timestamp` and received at
    /// registry clock `now`.
    ///
    /// A report for an unregistered station creates it with neutral metrics
    /// and no sensors before the issue is applied.
    pub fn report_issue(
        &mut self,
        id: &StationId,
        issue_type: &str,
        timestamp: f64,
        now: f64,
    ) -> Result<ReportOutcome, RegistryError> {
        if id.is_blank() {
            return Err(RegistryError::InvalidArgument(
                "station id must not be empty".to_string(),
            ));
        }

        if self.dedup.check_and_record(id, issue_type, timestamp, now) == DedupVerdict::Seen {
            return Ok(ReportOutcome::Duplicate);
        }

        if !self.stations.contains_key(id) {
            debug!(station_id = %id, "station created by issue report");
            self.stations
                .insert(id.clone(), Station::new(id.clone(), Vec::new()));
            self.outbox.push(Outbound::Event(StationEvent::StationRegistered {
                station_id: id.clone(),
                timestamp: unix_timestamp(),
            }));
        }

        let kind = IssueKind::classify(issue_type);
        let targets = match self.stations.get_mut(id) {
            Some(station) => {
                kind.apply(&mut station.metrics);
                station.last_issue_at = Some(Utc::now());
                station.neighbors.iter().cloned().collect::<Vec<_>>()
            }
            None => Vec::new(),
        };

        debug!(station_id = %id, issue_type, ?kind, "issue accepted");
        self.outbox.push(Outbound::Event(StationEvent::IssueReported {
            station_id: id.clone(),
            issue_type: issue_type.to_string(),
            timestamp,
        }));
        if !targets.is_empty() {
            self.outbox.push(Outbound::NotifyNeighbors {
                origin: id.clone(),
                issue_type: issue_type.to_string(),
                targets,
            });
        }
        Ok(ReportOutcome::Accepted)
    }

    /// Queue a notification for every neighbor of `id`. Unknown stations
    /// have no neighbors, so the call notifies nobody.
    pub fn notify_neighbors(&mut self, id: &StationId, issue_type: &str) -> usize {
        let targets: Vec<StationId> = self
            .stations
            .get(id)
            .map(|s| s.neighbors.iter().cloned().collect())
            .unwrap_or_default();

        let count = targets.len();
        if count > 0 {
            self.outbox.push(Outbound::NotifyNeighbors {
                origin: id.clone(),
                issue_type: issue_type.to_string(),
                targets,
            });
        }
        count
    }

    /// Every station, sorted by id.
    pub fn list_stations(&self) -> Vec<&Station> {
        self.stations.values().collect()
    }

    /// Drop expired dedup windows.
    pub fn prune(&mut self, now: f64) -> usize {
        self.dedup.prune(now)
    }

    pub fn dedup_windows(&self) -> usize {
        self.dedup.window_count()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Take every pending outbound intent, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrowatch_types::issue::ELEVATED_POLLUTANTS;
    use hydrowatch_types::station::StationStatus;

    const WINDOW: u64 = 10;
    const NOW: f64 = 1_700_000_005.0;
    /// Start of the window containing `NOW`.
    const T: f64 = 1_700_000_000.0;

    fn id(s: &str) -> StationId {
        StationId::from(s)
    }

    fn registry_with(ids: &[&str]) -> StationRegistry {
        let mut reg = StationRegistry::new(WINDOW, 6);
        for s in ids {
            reg.register(id(s), Vec::new()).unwrap();
        }
        reg.drain_outbox();
        reg
    }

    #[test]
    fn register_creates_neutral_station_and_emits_event() {
        let mut reg = StationRegistry::new(WINDOW, 6);
        reg.register(id("S1"), vec!["S1-0".to_string()]).unwrap();

        let station = reg.get_station(&id("S1")).unwrap();
        assert_eq!(station.metrics.ph, 7.0);
        assert_eq!(station.status(), StationStatus::Normal);
        assert!(station.sensors.contains("S1-0"));

        let outbox = reg.drain_outbox();
        assert!(matches!(
            outbox.as_slice(),
            [Outbound::Event(StationEvent::StationRegistered { station_id, .. })] if station_id.as_str() == "S1"
        ));
    }

    #[test]
    fn register_twice_is_already_exists_and_state_unchanged() {
        let mut reg = registry_with(&["S1"]);
        reg.report_issue(&id("S1"), "High Pollution detected", T, NOW)
            .unwrap();
        reg.drain_outbox();

        let err = reg.register(id("S1"), Vec::new()).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyExists("S1".to_string()));
        assert_eq!(
            reg.get_station(&id("S1")).unwrap().metrics.pollutants,
            ELEVATED_POLLUTANTS
        );
        assert!(reg.drain_outbox().is_empty());
    }

    #[test]
    fn register_blank_id_is_invalid() {
        let mut reg = StationRegistry::new(WINDOW, 6);
        assert!(matches!(
            reg.register(id("  "), Vec::new()),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn add_neighbor_is_symmetric() {
        let mut reg = registry_with(&["A", "B"]);
        assert_eq!(reg.add_neighbor(&id("A"), &id("B")).unwrap(), NeighborLink::Added);

        assert_eq!(reg.neighbors(&id("A")).unwrap(), vec![id("B")]);
        assert_eq!(reg.neighbors(&id("B")).unwrap(), vec![id("A")]);
    }

    #[test]
    fn add_neighbor_twice_is_idempotent_and_emits_once() {
        let mut reg = registry_with(&["A", "B"]);
        reg.add_neighbor(&id("A"), &id("B")).unwrap();
        assert_eq!(
            reg.add_neighbor(&id("B"), &id("A")).unwrap(),
            NeighborLink::AlreadyPresent
        );

        assert_eq!(reg.neighbors(&id("A")).unwrap(), vec![id("B")]);
        assert_eq!(reg.neighbors(&id("B")).unwrap(), vec![id("A")]);
        assert_eq!(reg.drain_outbox().len(), 1);
    }

    #[test]
    fn self_neighbor_is_invalid_even_when_unregistered() {
        let mut reg = registry_with(&["A"]);
        assert!(matches!(
            reg.add_neighbor(&id("A"), &id("A")),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            reg.add_neighbor(&id("Z"), &id("Z")),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(reg.neighbors(&id("A")).unwrap().is_empty());
    }

    #[test]
    fn add_neighbor_unknown_station_is_not_found() {
        let mut reg = registry_with(&["A"]);
        assert_eq!(
            reg.add_neighbor(&id("A"), &id("B")).unwrap_err(),
            RegistryError::NotFound("B".to_string())
        );
        assert!(reg.neighbors(&id("A")).unwrap().is_empty());
    }

    #[test]
    fn report_issue_dedups_within_window() {
        let mut reg = registry_with(&["A"]);
        let a = id("A");
        let issue = "High Pollution detected";

        assert_eq!(reg.report_issue(&a, issue, T, NOW).unwrap(), ReportOutcome::Accepted);
        assert_eq!(reg.report_issue(&a, issue, T + 1.0, NOW).unwrap(), ReportOutcome::Duplicate);
        assert_eq!(
            reg.report_issue(&a, issue, T + WINDOW as f64, NOW).unwrap(),
            ReportOutcome::Accepted
        );
    }

    #[test]
    fn accepted_pollution_report_overrides_metrics() {
        let mut reg = registry_with(&["A"]);
        reg.report_issue(&id("A"), "High Pollution detected", T, NOW)
            .unwrap();

        let station = reg.get_station(&id("A")).unwrap();
        assert_eq!(station.metrics.pollutants, 95.0);
        assert_eq!(station.status(), StationStatus::Critical);
        assert!(station.last_issue_at.is_some());
    }

    #[test]
    fn duplicate_reports_have_no_side_effects() {
        let mut reg = registry_with(&["A", "B"]);
        reg.add_neighbor(&id("A"), &id("B")).unwrap();
        reg.report_issue(&id("A"), "pH imbalance (4.5)", T, NOW).unwrap();
        reg.drain_outbox();

        assert_eq!(
            reg.report_issue(&id("A"), "pH imbalance (4.5)", T + 2.0, NOW).unwrap(),
            ReportOutcome::Duplicate
        );
        assert!(reg.drain_outbox().is_empty());
        assert_eq!(reg.get_station(&id("A")).unwrap().metrics.pollutants, 0.0);
    }

    #[test]
    fn report_timestamp_far_from_now_is_accepted() {
        let mut reg = registry_with(&["A"]);
        let issue = "High Pollution detected";

        assert_eq!(reg.report_issue(&id("A"), issue, 1_000.0, NOW).unwrap(), ReportOutcome::Accepted);
        assert_eq!(reg.report_issue(&id("A"), issue, 1_001.0, NOW).unwrap(), ReportOutcome::Duplicate);
        assert_eq!(
            reg.report_issue(&id("A"), issue, NOW + 3_600.0, NOW).unwrap(),
            ReportOutcome::Accepted
        );
        assert_eq!(reg.get_station(&id("A")).unwrap().metrics.pollutants, ELEVATED_POLLUTANTS);
    }

    #[test]
    fn report_issue_creates_unknown_station() {
        let mut reg = StationRegistry::new(WINDOW, 6);
        assert_eq!(
            reg.report_issue(&id("ghost"), "High Pollution detected", T, NOW).unwrap(),
            ReportOutcome::Accepted
        );

        let station = reg.get_station(&id("ghost")).unwrap();
        assert_eq!(station.metrics.pollutants, ELEVATED_POLLUTANTS);
        assert!(station.sensors.is_empty());

        let outbox = reg.drain_outbox();
        assert_eq!(outbox.len(), 2);
        assert!(matches!(
            &outbox[0],
            Outbound::Event(StationEvent::StationRegistered { station_id, .. }) if station_id.as_str() == "ghost"
        ));

        // Explicit registration afterwards sees the implicitly created station.
        assert!(matches!(
            reg.register(id("ghost"), Vec::new()),
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn report_issue_blank_id_is_invalid() {
        let mut reg = StationRegistry::new(WINDOW, 6);
        assert!(matches!(
            reg.report_issue(&id(""), "High Pollution detected", T, NOW),
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn accepted_report_queues_issue_event_and_notification() {
        let mut reg = registry_with(&["S1", "S2"]);
        reg.add_neighbor(&id("S1"), &id("S2")).unwrap();
        reg.drain_outbox();

        reg.report_issue(&id("S1"), "High Pollution detected", T, NOW)
            .unwrap();
        let outbox = reg.drain_outbox();
        assert_eq!(outbox.len(), 2);
        assert!(matches!(
            &outbox[0],
            Outbound::Event(StationEvent::IssueReported { station_id, .. }) if station_id.as_str() == "S1"
        ));
        assert_eq!(
            outbox[1],
            Outbound::NotifyNeighbors {
                origin: id("S1"),
                issue_type: "High Pollution detected".to_string(),
                targets: vec![id("S2")],
            }
        );
    }

    #[test]
    fn notify_neighbors_unknown_station_notifies_nobody() {
        let mut reg = registry_with(&["A", "B", "C"]);
        reg.add_neighbor(&id("A"), &id("B")).unwrap();
        reg.add_neighbor(&id("A"), &id("C")).unwrap();
        reg.drain_outbox();

        assert_eq!(reg.notify_neighbors(&id("A"), "Turbidity"), 2);
        assert_eq!(reg.notify_neighbors(&id("nobody"), "Turbidity"), 0);
        assert_eq!(reg.drain_outbox().len(), 1);
    }

    #[test]
    fn list_stations_is_sorted() {
        let reg = registry_with(&["C", "A", "B"]);
        let ids: Vec<&str> = reg.list_stations().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn dedup_memory_bounded_across_windows() {
        let mut reg = StationRegistry::new(WINDOW, 6);
        reg.register(id("A"), Vec::new()).unwrap();

        for i in 0..50 {
            let now = T + (i * WINDOW) as f64;
            reg.report_issue(&id("A"), "High Turbidity (9.9)", now, now)
                .unwrap();
        }
        assert_eq!(reg.dedup_windows(), 6);
    }
}
