//! Infrastructure layer for Hydrowatch.
//!
//! Contains implementations of the ports defined in `hydrowatch-core`:
//! the HTTP control-plane client, the HTTP event relay transport, the SSE
//! event subscription, and config file loading.

pub mod config;
pub mod http;
