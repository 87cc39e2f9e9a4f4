//! Registry actor: the single task that owns [`StationRegistry`].
//!
//! Callers talk to it through a cloneable [`RegistryHandle`]. Each call
//! sends a [`RegistryCommand`] into the bounded inbox and waits on a oneshot
//! reply, bounded by the call timeout. The actor processes one command at a
//! time, so registry mutations are totally ordered.

use std::time::Duration;

use hydrowatch_types::config::ControlConfig;
use hydrowatch_types::error::RegistryError;
use hydrowatch_types::event::unix_timestamp;
use hydrowatch_types::issue::ReportOutcome;
use hydrowatch_types::station::{Station, StationId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{NeighborLink, Outbound, StationRegistry};

type Reply<T> = oneshot::Sender<Result<T, RegistryError>>;

/// A request to the registry actor.
#[derive(Debug)]
pub enum RegistryCommand {
    Register {
        station_id: StationId,
        sensors: Vec<String>,
        reply: Reply<()>,
    },
    GetStation {
        station_id: StationId,
        reply: Reply<Station>,
    },
    GetNeighbors {
        station_id: StationId,
        reply: Reply<Vec<StationId>>,
    },
    AddNeighbor {
        station_id: StationId,
        neighbor_id: StationId,
        reply: Reply<NeighborLink>,
    },
    ReportIssue {
        station_id: StationId,
        issue_type: String,
        timestamp: f64,
        reply: Reply<ReportOutcome>,
    },
    NotifyNeighbors {
        station_id: StationId,
        issue_type: String,
        reply: Reply<usize>,
    },
    ListStations {
        reply: Reply<Vec<Station>>,
    },
}

/// Cloneable client side of the registry actor.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
    call_timeout: Duration,
}

impl RegistryHandle {
    pub(crate) fn new(tx: mpsc::Sender<RegistryCommand>, call_timeout: Duration) -> Self {
        Self { tx, call_timeout }
    }

    /// Send a command and wait for its reply.
    ///
    /// A stopped actor or a missed deadline both surface as `Unavailable`.
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = make(reply_tx);

        let exchange = async {
            self.tx
                .send(command)
                .await
                .map_err(|_| RegistryError::Unavailable("registry actor stopped".to_string()))?;
            reply_rx.await.map_err(|_| {
                RegistryError::Unavailable("registry dropped the request".to_string())
            })?
        };

        match tokio::time::timeout(self.call_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Unavailable(format!(
                "no reply within {:?}",
                self.call_timeout
            ))),
        }
    }

    pub async fn register(
        &self,
        station_id: StationId,
        sensors: Vec<String>,
    ) -> Result<(), RegistryError> {
        self.call(|reply| RegistryCommand::Register {
            station_id,
            sensors,
            reply,
        })
        .await
    }

    pub async fn get_station(&self, station_id: StationId) -> Result<Station, RegistryError> {
        self.call(|reply| RegistryCommand::GetStation { station_id, reply })
            .await
    }

    pub async fn neighbors(&self, station_id: StationId) -> Result<Vec<StationId>, RegistryError> {
        self.call(|reply| RegistryCommand::GetNeighbors { station_id, reply })
            .await
    }

    pub async fn add_neighbor(
        &self,
        station_id: StationId,
        neighbor_id: StationId,
    ) -> Result<NeighborLink, RegistryError> {
        self.call(|reply| RegistryCommand::AddNeighbor {
            station_id,
            neighbor_id,
            reply,
        })
        .await
    }

    pub async fn report_issue(
        &self,
        station_id: StationId,
        issue_type: String,
        timestamp: f64,
    ) -> Result<ReportOutcome, RegistryError> {
        self.call(|reply| RegistryCommand::ReportIssue {
            station_id,
            issue_type,
            timestamp,
            reply,
        })
        .await
    }

    pub async fn notify_neighbors(
        &self,
        station_id: StationId,
        issue_type: String,
    ) -> Result<usize, RegistryError> {
        self.call(|reply| RegistryCommand::NotifyNeighbors {
            station_id,
            issue_type,
            reply,
        })
        .await
    }

    pub async fn list_stations(&self) -> Result<Vec<Station>, RegistryError> {
        self.call(|reply| RegistryCommand::ListStations { reply })
            .await
    }
}

struct RegistryActor {
    state: StationRegistry,
    inbox: mpsc::Receiver<RegistryCommand>,
    outbound: mpsc::UnboundedSender<Outbound>,
    prune_every: Duration,
}

impl RegistryActor {
    async fn run(mut self, cancel: CancellationToken) {
        let mut prune = tokio::time::interval(self.prune_every);
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = prune.tick() => {
                    let dropped = self.state.prune(unix_timestamp());
                    if dropped > 0 {
                        debug!(dropped, "pruned expired dedup windows");
                    }
                }
                command = self.inbox.recv() => match command {
                    Some(command) => {
                        self.handle(command);
                        self.flush();
                    }
                    None => break,
                },
            }
        }

        info!(stations = self.state.len(), "registry actor stopped");
    }

    fn handle(&mut self, command: RegistryCommand) {
        // A failed reply send only means the caller gave up waiting.
        match command {
            RegistryCommand::Register {
                station_id,
                sensors,
                reply,
            } => {
                let _ = reply.send(self.state.register(station_id, sensors));
            }
            RegistryCommand::GetStation { station_id, reply } => {
                let _ = reply.send(self.state.get_station(&station_id).cloned());
            }
            RegistryCommand::GetNeighbors { station_id, reply } => {
                let _ = reply.send(self.state.neighbors(&station_id));
            }
            RegistryCommand::AddNeighbor {
                station_id,
                neighbor_id,
                reply,
            } => {
                let _ = reply.send(self.state.add_neighbor(&station_id, &neighbor_id));
            }
            RegistryCommand::ReportIssue {
                station_id,
                issue_type,
                timestamp,
                reply,
            } => {
                let result =
                    self.state
                        .report_issue(&station_id, &issue_type, timestamp, unix_timestamp());
                let _ = reply.send(result);
            }
            RegistryCommand::NotifyNeighbors {
                station_id,
                issue_type,
                reply,
            } => {
                let _ = reply.send(Ok(self.state.notify_neighbors(&station_id, &issue_type)));
            }
            RegistryCommand::ListStations { reply } => {
                let stations = self.state.list_stations().into_iter().cloned().collect();
                let _ = reply.send(Ok(stations));
            }
        }
    }

    fn flush(&mut self) {
        for item in self.state.drain_outbox() {
            if self.outbound.send(item).is_err() {
                warn!("event dispatcher gone, dropping outbound registry event");
            }
        }
    }
}

/// Spawn the registry actor.
///
/// Returns the handle and the receiving end of the outbound queue, which
/// should be given to an [`crate::event::dispatcher::EventDispatcher`].
pub fn spawn_registry(
    config: &ControlConfig,
    cancel: CancellationToken,
) -> (RegistryHandle, mpsc::UnboundedReceiver<Outbound>, JoinHandle<()>) {
    let (tx, inbox) = mpsc::channel(config.inbox_capacity.max(1));
    let (outbound, outbound_rx) = mpsc::unbounded_channel();

    let actor = RegistryActor {
        state: StationRegistry::new(
            config.dedup.window_secs,
            config.dedup.retention_windows,
        ),
        inbox,
        outbound,
        prune_every: Duration::from_secs(config.dedup.prune_interval_secs.max(1)),
    };
    let task = tokio::spawn(actor.run(cancel));

    (RegistryHandle::new(tx, config.call_timeout()), outbound_rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn spawn() -> (RegistryHandle, mpsc::UnboundedReceiver<Outbound>, CancellationToken) {
        let cancel = CancellationToken::new();
        let (handle, outbound, _task) = spawn_registry(&ControlConfig::default(), cancel.clone());
        (handle, outbound, cancel)
    }

    #[tokio::test]
    async fn register_and_query_through_handle() {
        let (handle, mut outbound, _cancel) = spawn();

        handle
            .register(StationId::from("S1"), vec!["S1-0".to_string()])
            .await
            .unwrap();
        let station = handle.get_station(StationId::from("S1")).await.unwrap();
        assert_eq!(station.id.as_str(), "S1");

        let item = outbound.recv().await.unwrap();
        assert!(matches!(item, Outbound::Event(_)));
    }

    #[tokio::test]
    async fn errors_pass_through_handle() {
        let (handle, _outbound, _cancel) = spawn();
        let err = handle.get_station(StationId::from("nope")).await.unwrap_err();
        assert_eq!(err, RegistryError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn concurrent_reports_accept_exactly_once() {
        let (handle, _outbound, _cancel) = spawn();
        handle
            .register(StationId::from("S1"), Vec::new())
            .await
            .unwrap();

        let ts = unix_timestamp();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handle = handle.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                handle
                    .report_issue(StationId::from("S1"), "High Pollution detected".to_string(), ts)
                    .await
                    .unwrap()
            }));
        }

        let mut accepted = 0;
        let mut duplicates = 0;
        for task in tasks {
            match task.await.unwrap() {
                ReportOutcome::Accepted => accepted += 1,
                ReportOutcome::Duplicate => duplicates += 1,
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 15);
    }

    #[tokio::test]
    async fn skewed_report_timestamps_are_still_accepted() {
        let (handle, _outbound, _cancel) = spawn();
        let a = StationId::from("A");
        handle.register(a.clone(), Vec::new()).await.unwrap();

        let issue = "High Pollution detected".to_string();
        for ts in [1000.0, unix_timestamp() - 120.0] {
            let first = handle.report_issue(a.clone(), issue.clone(), ts).await.unwrap();
            let again = handle.report_issue(a.clone(), issue.clone(), ts + 1.0).await.unwrap();
            assert_eq!(first, ReportOutcome::Accepted);
            assert_eq!(again, ReportOutcome::Duplicate);
        }

        let station = handle.get_station(a).await.unwrap();
        assert_eq!(station.metrics.pollutants, 95.0);
    }

    #[tokio::test]
    async fn cancelled_actor_is_unavailable() {
        let (handle, _outbound, cancel) = spawn();
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = handle.list_stations().await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unanswered_call_times_out() {
        let (tx, _inbox) = mpsc::channel(4);
        let handle = RegistryHandle::new(tx, Duration::from_millis(30));

        let err = handle.list_stations().await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(msg) if msg.contains("no reply")));
    }
}
