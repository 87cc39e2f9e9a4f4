//! Shared application state for the control service.
//!
//! `AppState` owns the registry handle, the event bus and the worker
//! permits. It is cheap to clone; every handler receives its own copy.

use std::sync::Arc;

use hydrowatch_core::event::{EventBus, EventDispatcher};
use hydrowatch_core::registry::{spawn_registry, RegistryHandle};
use hydrowatch_types::config::ControlConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    /// Client side of the registry actor.
    pub registry: RegistryHandle,

    /// Broadcast bus every event subscriber reads from.
    pub bus: EventBus,

    /// Permits for concurrently running RPCs (`max_workers`).
    pub workers: Arc<Semaphore>,

    /// Fires on shutdown; long-lived streams end when it does.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Spawn the registry actor and the event dispatcher.
    ///
    /// Both background tasks stop when `cancel` fires; their handles are
    /// returned so the caller can wait for them on shutdown.
    pub fn init(config: &ControlConfig, cancel: CancellationToken) -> (Self, Vec<JoinHandle<()>>) {
        let bus = EventBus::new(config.event_buffer);
        let (registry, outbound, registry_task) = spawn_registry(config, cancel.clone());
        let dispatcher_task = EventDispatcher::new(bus.clone(), outbound).spawn(cancel.clone());

        tracing::debug!(
            max_workers = config.max_workers,
            call_timeout_ms = config.call_timeout_ms,
            "control service state initialized"
        );

        let state = Self {
            registry,
            bus,
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
            cancel,
        };
        (state, vec![registry_task, dispatcher_task])
    }
}
