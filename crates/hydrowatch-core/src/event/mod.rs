//! Event dissemination.
//!
//! - `bus`: in-process broadcast of `StationEvent` to every subscriber
//! - `dispatcher`: drains registry intents onto the bus
//! - `publisher`: retrying, reconnecting remote publish path used by agents

pub mod bus;
pub mod dispatcher;
pub mod publisher;

pub use bus::EventBus;
pub use dispatcher::EventDispatcher;
pub use publisher::{EventChannel, EventTransport, PublishQueue, ReliablePublisher, RetryPolicy};
