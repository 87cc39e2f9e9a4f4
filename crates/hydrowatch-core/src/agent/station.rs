//! The station agent.
//!
//! One `StationAgent` runs per station process. It registers with the
//! control service, samples its sensors every interval, reports threshold
//! violations, and keeps a cached copy of its neighbor list that is always
//! replaced wholesale from the server.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use hydrowatch_types::error::{AgentError, ControlError};
use hydrowatch_types::event::{unix_timestamp, StationEvent};
use hydrowatch_types::rpc::StatusResponse;
use hydrowatch_types::station::StationId;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lifecycle::AgentState;
use crate::control::ControlPlane;
use crate::event::PublishQueue;
use crate::sensor::{Sensor, Thresholds};

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub thresholds: Thresholds,
    /// Caller-side deadline for every control service call.
    pub rpc_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            rpc_timeout: Duration::from_secs(5),
        }
    }
}

/// What one sampling tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub sensors_checked: usize,
    pub issues_fired: usize,
    /// Reports the registry accepted (not duplicates).
    pub reports_accepted: usize,
    pub report_failures: usize,
}

impl TickSummary {
    fn absorb(&mut self, other: TickSummary) {
        self.sensors_checked += other.sensors_checked;
        self.issues_fired += other.issues_fired;
        self.reports_accepted += other.reports_accepted;
        self.report_failures += other.report_failures;
    }
}

pub struct StationAgent<C: ControlPlane> {
    station_id: StationId,
    control: C,
    sensors: Vec<Arc<dyn Sensor>>,
    options: AgentOptions,
    state: RwLock<AgentState>,
    neighbors: RwLock<Arc<BTreeSet<StationId>>>,
    /// Neighbors to link once registration succeeds.
    links: Vec<StationId>,
    events: Option<PublishQueue>,
    /// Neighbor alerts received, per origin station.
    peer_alerts: DashMap<StationId, u64>,
}

impl<C: ControlPlane + 'static> StationAgent<C> {
    pub fn new(
        station_id: StationId,
        control: C,
        sensors: Vec<Arc<dyn Sensor>>,
        options: AgentOptions,
    ) -> Self {
        Self {
            station_id,
            control,
            sensors,
            options,
            state: RwLock::new(AgentState::Unregistered),
            neighbors: RwLock::new(Arc::new(BTreeSet::new())),
            links: Vec::new(),
            events: None,
            peer_alerts: DashMap::new(),
        }
    }

    /// Publish heartbeats and sensor alerts through `queue`.
    pub fn with_publisher(mut self, queue: PublishQueue) -> Self {
        self.events = Some(queue);
        self
    }

    /// Link these stations as soon as registration succeeds.
    pub fn with_neighbors(mut self, neighbors: impl IntoIterator<Item = StationId>) -> Self {
        self.links = neighbors
            .into_iter()
            .filter(|id| *id != self.station_id)
            .collect();
        self
    }

    pub fn station_id(&self) -> &StationId {
        &self.station_id
    }

    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    async fn transition(&self, next: AgentState) -> bool {
        let mut state = self.state.write().await;
        if !state.can_transition_to(next) {
            return false;
        }
        let from = *state;
        debug!(station_id = %self.station_id, %from, to = %next, "agent state change");
        *state = next;
        true
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, ControlError>>,
    ) -> Result<T, ControlError> {
        tokio::time::timeout(self.options.rpc_timeout, fut)
            .await
            .unwrap_or(Err(ControlError::Timeout))
    }

    /// Register with the control service, then link the configured
    /// neighbors. An existing registration counts as success; any other
    /// failure leaves the agent unregistered. Link failures are only logged.
    pub async fn start(&self) -> Result<(), AgentError> {
        if self.state().await.is_registered() {
            return Ok(());
        }

        let sensor_ids: Vec<String> = self.sensors.iter().map(|s| s.id().to_string()).collect();
        match self
            .call(self.control.register(&self.station_id, &sensor_ids))
            .await
        {
            Ok(status) => info!(station_id = %self.station_id, message = %status.message, "station registered"),
            Err(ControlError::AlreadyExists(_)) => {
                info!(station_id = %self.station_id, "station already registered, continuing")
            }
            Err(e) => {
                warn!(station_id = %self.station_id, error = %e, "registration failed");
                return Err(e.into());
            }
        }

        self.transition(AgentState::Registered).await;
        for neighbor_id in &self.links {
            if let Err(e) = self.add_neighbor(neighbor_id).await {
                warn!(station_id = %self.station_id, %neighbor_id, error = %e, "could not link neighbor");
            }
        }
        if let Err(e) = self.refresh_neighbors().await {
            warn!(station_id = %self.station_id, error = %e, "could not load neighbors");
        }
        Ok(())
    }

    /// Link this station with `neighbor_id` and refresh the cache.
    pub async fn add_neighbor(&self, neighbor_id: &StationId) -> Result<StatusResponse, AgentError> {
        if *neighbor_id == self.station_id {
            return Err(AgentError::SelfNeighbor);
        }
        if !self.state().await.is_registered() {
            return Err(AgentError::NotRegistered(self.station_id.to_string()));
        }

        let status = self
            .call(self.control.add_neighbor(&self.station_id, neighbor_id))
            .await?;
        info!(station_id = %self.station_id, neighbor_id = %neighbor_id, "neighbor linked");
        self.refresh_neighbors().await?;
        Ok(status)
    }

    /// Fetch the neighbor list and replace the cache with it.
    pub async fn refresh_neighbors(&self) -> Result<Arc<BTreeSet<StationId>>, AgentError> {
        let fetched = self.call(self.control.neighbors(&self.station_id)).await?;
        let fresh = Arc::new(fetched.into_iter().collect::<BTreeSet<_>>());
        *self.neighbors.write().await = Arc::clone(&fresh);
        debug!(station_id = %self.station_id, count = fresh.len(), "neighbor cache refreshed");
        Ok(fresh)
    }

    /// Snapshot of the cached neighbor list.
    pub async fn neighbors(&self) -> Arc<BTreeSet<StationId>> {
        Arc::clone(&*self.neighbors.read().await)
    }

    pub fn peer_alert_count(&self, origin: &StationId) -> u64 {
        self.peer_alerts.get(origin).map(|n| *n).unwrap_or(0)
    }

    fn emit(&self, event: StationEvent) {
        if let Some(queue) = &self.events {
            if let Err(e) = queue.enqueue(event) {
                warn!(station_id = %self.station_id, error = %e, "dropping event");
            }
        }
    }

    /// One sampling round: every sensor is checked concurrently and the
    /// call returns only after all checks have finished.
    pub async fn tick(self: &Arc<Self>) -> TickSummary {
        if !self.state().await.is_registered() && self.start().await.is_err() {
            debug!(station_id = %self.station_id, "still unregistered, skipping sampling");
            return TickSummary::default();
        }

        let mut checks = JoinSet::new();
        for sensor in &self.sensors {
            checks.spawn(Arc::clone(self).check_sensor(Arc::clone(sensor)));
        }

        let mut summary = TickSummary::default();
        while let Some(result) = checks.join_next().await {
            match result {
                Ok(check) => summary.absorb(check),
                Err(e) => warn!(station_id = %self.station_id, error = %e, "sensor check panicked"),
            }
        }
        summary
    }

    async fn check_sensor(self: Arc<Self>, sensor: Arc<dyn Sensor>) -> TickSummary {
        self.emit(StationEvent::heartbeat(sensor.id()));

        let reading = sensor.sample();
        let issues = self.options.thresholds.evaluate(&reading);
        debug!(sensor_id = sensor.id(), ?reading, issues = issues.len(), "sensor sampled");

        let mut summary = TickSummary {
            sensors_checked: 1,
            issues_fired: issues.len(),
            ..TickSummary::default()
        };

        for issue in issues {
            let result = self
                .call(
                    self.control
                        .report_issue(&self.station_id, &issue.description, unix_timestamp()),
                )
                .await;

            match result {
                Ok(status) => {
                    if status.success {
                        summary.reports_accepted += 1;
                    }
                    debug!(sensor_id = sensor.id(), message = %status.message, "issue reported");
                    self.emit(StationEvent::SensorAlert {
                        station_id: self.station_id.clone(),
                        message: issue.description,
                        metrics: reading,
                        timestamp: unix_timestamp(),
                    });
                }
                Err(e) => {
                    summary.report_failures += 1;
                    warn!(sensor_id = sensor.id(), issue = %issue.description, error = %e, "issue report failed");
                }
            }
        }

        summary
    }

    /// React to a bus event. Safe to call more than once per event.
    pub async fn handle_event(&self, event: &StationEvent) {
        match event {
            StationEvent::NeighborAdded {
                station_id,
                neighbour_id,
                ..
            } if *station_id == self.station_id || *neighbour_id == self.station_id => {
                if let Err(e) = self.refresh_neighbors().await {
                    warn!(station_id = %self.station_id, error = %e, "neighbor refresh after update failed");
                }
            }
            StationEvent::NeighborNotified {
                origin_station,
                target_station,
                issue_type,
                ..
            } if *target_station == self.station_id => {
                *self.peer_alerts.entry(origin_station.clone()).or_insert(0) += 1;
                info!(
                    station_id = %self.station_id,
                    origin = %origin_station,
                    issue_type = %issue_type,
                    "neighbor reported an issue"
                );
            }
            _ => {}
        }
    }

    /// Feed events from `stream` into [`Self::handle_event`] until cancelled
    /// or the stream ends.
    pub async fn follow_events<S>(self: Arc<Self>, stream: S, cancel: CancellationToken)
    where
        S: Stream<Item = StationEvent> + Send,
    {
        let mut stream = std::pin::pin!(stream);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = stream.next() => match next {
                    Some(event) => self.handle_event(&event).await,
                    None => break,
                },
            }
        }
        debug!(station_id = %self.station_id, "event follower stopped");
    }

    /// Sample every `interval` until cancelled. Control service failures
    /// are logged and never end the loop.
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        if let Err(e) = self.start().await {
            warn!(station_id = %self.station_id, error = %e, "starting unregistered, will retry each tick");
        }

        let mut ticks: u64 = 0;
        loop {
            let summary = tokio::select! {
                _ = cancel.cancelled() => break,
                summary = self.tick() => summary,
            };
            ticks += 1;

            if self.state().await == AgentState::Registered {
                self.transition(AgentState::Sampling).await;
            }
            debug!(station_id = %self.station_id, tick = ticks, ?summary, "tick complete");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.transition(AgentState::Stopped).await;
        info!(station_id = %self.station_id, ticks, "station agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use futures_util::stream;
    use hydrowatch_types::config::ControlConfig;
    use hydrowatch_types::event::NeighborAction;
    use hydrowatch_types::rpc::{QualityDataResponse, StationSummary};
    use hydrowatch_types::station::QualityMetrics;
    use tokio::sync::mpsc;

    use crate::registry::{spawn_registry, RegistryHandle};

    struct FixedSensor {
        id: String,
        reading: QualityMetrics,
        samples: AtomicUsize,
    }

    impl FixedSensor {
        fn new(id: &str, ph: f64, turbidity: f64, pollutants: f64) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                reading: QualityMetrics {
                    ph,
                    turbidity,
                    pollutants,
                },
                samples: AtomicUsize::new(0),
            })
        }
    }

    impl Sensor for FixedSensor {
        fn id(&self) -> &str {
            &self.id
        }

        fn sample(&self) -> QualityMetrics {
            self.samples.fetch_add(1, Ordering::SeqCst);
            self.reading
        }
    }

    /// Control plane whose every call fails.
    struct DownControl;

    impl ControlPlane for DownControl {
        async fn register(&self, _: &StationId, _: &[String]) -> Result<StatusResponse, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn quality_data(&self, _: &StationId) -> Result<QualityDataResponse, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn neighbors(&self, _: &StationId) -> Result<Vec<StationId>, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn add_neighbor(&self, _: &StationId, _: &StationId) -> Result<StatusResponse, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn report_issue(&self, _: &StationId, _: &str, _: f64) -> Result<StatusResponse, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn notify_neighbors(&self, _: &StationId, _: &str) -> Result<StatusResponse, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
        async fn list_stations(&self) -> Result<Vec<StationSummary>, ControlError> {
            Err(ControlError::Unavailable("down".to_string()))
        }
    }

    /// Registry that refuses registration until switched on.
    struct Flaky {
        inner: RegistryHandle,
        up: AtomicBool,
    }

    impl ControlPlane for Flaky {
        async fn register(&self, id: &StationId, sensors: &[String]) -> Result<StatusResponse, ControlError> {
            if !self.up.load(Ordering::SeqCst) {
                return Err(ControlError::Unavailable("booting".to_string()));
            }
            ControlPlane::register(&self.inner, id, sensors).await
        }
        async fn quality_data(&self, id: &StationId) -> Result<QualityDataResponse, ControlError> {
            ControlPlane::quality_data(&self.inner, id).await
        }
        async fn neighbors(&self, id: &StationId) -> Result<Vec<StationId>, ControlError> {
            ControlPlane::neighbors(&self.inner, id).await
        }
        async fn add_neighbor(&self, id: &StationId, neighbor: &StationId) -> Result<StatusResponse, ControlError> {
            ControlPlane::add_neighbor(&self.inner, id, neighbor).await
        }
        async fn report_issue(&self, id: &StationId, issue: &str, ts: f64) -> Result<StatusResponse, ControlError> {
            ControlPlane::report_issue(&self.inner, id, issue, ts).await
        }
        async fn notify_neighbors(&self, id: &StationId, issue: &str) -> Result<StatusResponse, ControlError> {
            ControlPlane::notify_neighbors(&self.inner, id, issue).await
        }
        async fn list_stations(&self) -> Result<Vec<StationSummary>, ControlError> {
            ControlPlane::list_stations(&self.inner).await
        }
    }

    fn registry() -> RegistryHandle {
        let (handle, _outbound, _task) =
            spawn_registry(&ControlConfig::default(), CancellationToken::new());
        handle
    }

    fn agent(
        id: &str,
        control: RegistryHandle,
        sensors: Vec<Arc<dyn Sensor>>,
    ) -> (Arc<StationAgent<RegistryHandle>>, mpsc::Receiver<StationEvent>) {
        let (queue, rx) = PublishQueue::channel(64);
        let agent = StationAgent::new(StationId::from(id), control, sensors, AgentOptions::default())
            .with_publisher(queue);
        (Arc::new(agent), rx)
    }

    #[tokio::test]
    async fn start_registers_and_tolerates_existing_registration() {
        let control = registry();
        control.register(StationId::from("S1"), Vec::new()).await.unwrap();

        let (agent, _rx) = agent("S1", control, Vec::new());
        assert_eq!(agent.state().await, AgentState::Unregistered);
        agent.start().await.unwrap();
        assert_eq!(agent.state().await, AgentState::Registered);
    }

    #[tokio::test]
    async fn add_neighbor_rejects_self_and_unregistered() {
        let (agent, _rx) = agent("S1", registry(), Vec::new());

        assert!(matches!(
            agent.add_neighbor(&StationId::from("S1")).await,
            Err(AgentError::SelfNeighbor)
        ));
        assert!(matches!(
            agent.add_neighbor(&StationId::from("S2")).await,
            Err(AgentError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn configured_neighbors_link_after_late_registration() {
        let inner = registry();
        inner.register(StationId::from("S2"), Vec::new()).await.unwrap();
        let control = Flaky {
            inner: inner.clone(),
            up: AtomicBool::new(false),
        };
        let agent = Arc::new(
            StationAgent::new(StationId::from("S1"), control, Vec::new(), AgentOptions::default())
                .with_neighbors([StationId::from("S2"), StationId::from("S1")]),
        );

        assert!(agent.start().await.is_err());
        assert!(agent.neighbors().await.is_empty());

        agent.control.up.store(true, Ordering::SeqCst);
        agent.tick().await;
        assert_eq!(agent.state().await, AgentState::Registered);
        assert!(agent.neighbors().await.contains(&StationId::from("S2")));
        assert_eq!(
            inner.neighbors(StationId::from("S2")).await.unwrap(),
            vec![StationId::from("S1")]
        );
    }

    #[tokio::test]
    async fn add_neighbor_refreshes_cache() {
        let control = registry();
        control.register(StationId::from("S2"), Vec::new()).await.unwrap();
        let (agent, _rx) = agent("S1", control, Vec::new());
        agent.start().await.unwrap();

        agent.add_neighbor(&StationId::from("S2")).await.unwrap();
        let cached = agent.neighbors().await;
        assert_eq!(cached.iter().map(|s| s.as_str()).collect::<Vec<_>>(), vec!["S2"]);
    }

    #[tokio::test]
    async fn tick_waits_for_every_sensor_and_reports_issues() {
        let control = registry();
        let clean = FixedSensor::new("S1-0", 7.0, 3.0, 10.0);
        let dirty = FixedSensor::new("S1-1", 7.0, 3.0, 99.0);
        let (agent, mut rx) = agent(
            "S1",
            control.clone(),
            vec![clean.clone() as Arc<dyn Sensor>, dirty.clone() as Arc<dyn Sensor>],
        );

        let summary = agent.tick().await;
        assert_eq!(summary.sensors_checked, 2);
        assert_eq!(summary.issues_fired, 1);
        assert_eq!(summary.reports_accepted, 1);
        assert_eq!(clean.samples.load(Ordering::SeqCst), 1);
        assert_eq!(dirty.samples.load(Ordering::SeqCst), 1);

        let station = control.get_station(StationId::from("S1")).await.unwrap();
        assert_eq!(station.metrics.pollutants, 95.0);

        let mut heartbeats = 0;
        let mut alerts = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                StationEvent::SensorHeartbeat { .. } => heartbeats += 1,
                StationEvent::SensorAlert { message, metrics, .. } => {
                    assert_eq!(message, "High Pollution detected");
                    assert_eq!(metrics.pollutants, 99.0);
                    alerts += 1;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!((heartbeats, alerts), (2, 1));
    }

    #[tokio::test]
    async fn second_tick_in_window_is_duplicate_but_still_alerts() {
        let control = registry();
        let dirty = FixedSensor::new("S1-0", 7.0, 3.0, 99.0);
        let (agent, mut rx) = agent("S1", control, vec![dirty as Arc<dyn Sensor>]);

        assert_eq!(agent.tick().await.reports_accepted, 1);
        let second = agent.tick().await;
        // Both ticks land in the same 10 s window unless the test straddles
        // a boundary, in which case the second report is accepted too.
        assert!(second.reports_accepted <= 1);
        assert_eq!(second.issues_fired, 1);

        let alerts = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, StationEvent::SensorAlert { .. }))
            .count();
        assert_eq!(alerts, 2);
    }

    #[tokio::test]
    async fn failing_control_never_ends_the_loop() {
        let sensor = FixedSensor::new("S1-0", 4.5, 3.0, 10.0);
        let agent = Arc::new(StationAgent::new(
            StationId::from("S1"),
            DownControl,
            vec![sensor.clone() as Arc<dyn Sensor>],
            AgentOptions::default(),
        ));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(agent.clone().run(Duration::from_millis(5), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!task.is_finished());
        assert_eq!(agent.state().await, AgentState::Unregistered);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(agent.state().await, AgentState::Stopped);
        // Never registered, so no sensor was sampled.
        assert_eq!(sensor.samples.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_moves_to_sampling_then_stopped() {
        let (agent, _rx) = agent("S1", registry(), Vec::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(agent.clone().run(Duration::from_millis(5), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(agent.state().await, AgentState::Sampling);
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(agent.state().await, AgentState::Stopped);
    }

    #[tokio::test]
    async fn neighbor_events_refresh_cache_and_count_alerts() {
        let control = registry();
        control.register(StationId::from("S2"), Vec::new()).await.unwrap();
        let (agent, _rx) = agent("S1", control.clone(), Vec::new());
        agent.start().await.unwrap();

        // Another process links the stations; the agent learns via the bus.
        control
            .add_neighbor(StationId::from("S2"), StationId::from("S1"))
            .await
            .unwrap();
        assert!(agent.neighbors().await.is_empty());

        let added = StationEvent::NeighborAdded {
            station_id: StationId::from("S2"),
            neighbour_id: StationId::from("S1"),
            action: NeighborAction::Added,
        };
        let alert = StationEvent::NeighborNotified {
            origin_station: StationId::from("S2"),
            target_station: StationId::from("S1"),
            issue_type: "High Pollution detected".to_string(),
            timestamp: unix_timestamp(),
        };
        let elsewhere = StationEvent::NeighborNotified {
            origin_station: StationId::from("S2"),
            target_station: StationId::from("S3"),
            issue_type: "High Pollution detected".to_string(),
            timestamp: unix_timestamp(),
        };

        agent
            .clone()
            .follow_events(
                stream::iter(vec![added.clone(), added, alert, elsewhere]),
                CancellationToken::new(),
            )
            .await;

        assert!(agent.neighbors().await.contains(&StationId::from("S2")));
        assert_eq!(agent.peer_alert_count(&StationId::from("S2")), 1);
    }
}
