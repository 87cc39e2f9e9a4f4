//! Station registry: synchronous state, its dedup window, and the actor
//! task that owns both.

pub mod actor;
pub mod dedup;
pub mod state;

pub use actor::{spawn_registry, RegistryCommand, RegistryHandle};
pub use state::{NeighborLink, Outbound, StationRegistry};
