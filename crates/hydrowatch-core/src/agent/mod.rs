//! Station agent: the station-side control loop.
//!
//! - `AgentState`: explicit lifecycle with checked transitions
//! - `StationAgent`: registration, periodic sampling, issue reporting,
//!   neighbor cache and reactions to bus events

pub mod lifecycle;
pub mod station;

pub use lifecycle::AgentState;
pub use station::{AgentOptions, StationAgent, TickSummary};
