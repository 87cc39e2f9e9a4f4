//! Moves registry outbound intents onto the event bus.
//!
//! The registry only enqueues; this task does the fan-out, so a large
//! neighbor set never lengthens a registry command.

use hydrowatch_types::event::{unix_timestamp, StationEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::bus::EventBus;
use crate::registry::Outbound;

pub struct EventDispatcher {
    bus: EventBus,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl EventDispatcher {
    pub fn new(bus: EventBus, outbound: mpsc::UnboundedReceiver<Outbound>) -> Self {
        Self { bus, outbound }
    }

    /// Turn one intent into the events it stands for.
    pub fn expand(item: Outbound) -> Vec<StationEvent> {
        match item {
            Outbound::Event(event) => vec![event],
            Outbound::NotifyNeighbors {
                origin,
                issue_type,
                targets,
            } => {
                let timestamp = unix_timestamp();
                targets
                    .into_iter()
                    .map(|target| StationEvent::NeighborNotified {
                        origin_station: origin.clone(),
                        target_station: target,
                        issue_type: issue_type.clone(),
                        timestamp,
                    })
                    .collect()
            }
        }
    }

    /// Run until cancelled or until the registry drops its sender.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = self.outbound.recv() => match item {
                    Some(item) => {
                        for event in Self::expand(item) {
                            let reached = self.bus.publish(event.clone());
                            debug!(kind = event.kind(), reached, "event dispatched");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("event dispatcher stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
