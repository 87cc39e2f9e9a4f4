//! Remote event publishing with retry and transparent reconnect.
//!
//! `EventTransport` is the port implemented by infra (HTTP relay) and by
//! test doubles. `ReliablePublisher` owns at most one open channel; a send
//! failure drops it, and the next attempt reconnects. Delivery is
//! best-effort at-least-once: after `max_attempts` the event is logged and
//! dropped, never surfaced as an error.

use std::future::Future;
use std::time::Duration;

use hydrowatch_types::config::PublishConfig;
use hydrowatch_types::error::BusError;
use hydrowatch_types::event::StationEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Capacity of the queue in front of a background publisher.
pub const PUBLISH_QUEUE_CAPACITY: usize = 256;

/// An open connection to the remote bus.
pub trait EventChannel: Send {
    fn send(
        &mut self,
        event: &StationEvent,
    ) -> impl Future<Output = Result<(), BusError>> + Send;
}

/// Opens channels to the remote bus.
pub trait EventTransport: Send + Sync {
    type Channel: EventChannel;

    fn connect(&self) -> impl Future<Output = Result<Self::Channel, BusError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PublishConfig::default())
    }
}

impl From<&PublishConfig> for RetryPolicy {
    fn from(config: &PublishConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }
}

pub struct ReliablePublisher<T: EventTransport> {
    transport: T,
    channel: Option<T::Channel>,
    policy: RetryPolicy,
}

impl<T: EventTransport> ReliablePublisher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            channel: None,
            policy,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Publish one event. Returns `false` once every attempt has failed.
    pub async fn publish(&mut self, event: &StationEvent) -> bool {
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            match self.try_once(event).await {
                Ok(()) => {
                    debug!(kind = event.kind(), attempt, "event published");
                    return true;
                }
                Err(e) => {
                    debug!(kind = event.kind(), attempt, error = %e, "publish attempt failed");
                    if attempt < max {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        warn!(
            kind = event.kind(),
            attempts = max,
            "giving up on event after repeated publish failures"
        );
        false
    }

    async fn try_once(&mut self, event: &StationEvent) -> Result<(), BusError> {
        if self.channel.is_none() {
            self.channel = Some(self.transport.connect().await?);
        }
        let Some(channel) = self.channel.as_mut() else {
            return Err(BusError::Closed);
        };

        if let Err(e) = channel.send(event).await {
            // Reconnect on the next attempt.
            self.channel = None;
            return Err(e);
        }
        Ok(())
    }
}

/// Totals reported when a publish loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Non-blocking front of a background [`ReliablePublisher`].
#[derive(Debug, Clone)]
pub struct PublishQueue {
    tx: mpsc::Sender<StationEvent>,
}

impl PublishQueue {
    /// A queue and its receiving end, for callers that drive delivery
    /// themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Spawn a publish loop delivering queued events in FIFO order.
    pub fn spawn<T>(
        publisher: ReliablePublisher<T>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<PublishStats>)
    where
        T: EventTransport + 'static,
    {
        let (queue, rx) = Self::channel(PUBLISH_QUEUE_CAPACITY);
        let task = tokio::spawn(run_publish_loop(publisher, rx, cancel));
        (queue, task)
    }

    /// Queue an event without waiting. Fails only when the queue is full or
    /// the loop has stopped.
    pub fn enqueue(&self, event: StationEvent) -> Result<(), BusError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Send("publish queue full".to_string()),
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }
}

/// Deliver events from `rx` until cancelled or every sender is gone.
pub async fn run_publish_loop<T: EventTransport>(
    mut publisher: ReliablePublisher<T>,
    mut rx: mpsc::Receiver<StationEvent>,
    cancel: CancellationToken,
) -> PublishStats {
    let mut stats = PublishStats::default();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if publisher.publish(&event).await {
            stats.delivered += 1;
        } else {
            stats.dropped += 1;
        }
    }

    debug!(delivered = stats.delivered, dropped = stats.dropped, "publish loop stopped");
    stats
}
