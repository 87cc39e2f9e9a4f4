//! Shared domain types for Hydrowatch.
//!
//! This crate contains the types exchanged between the control service,
//! station agents and event subscribers: stations and their metrics, issue
//! classification, the event wire format, RPC bodies, configuration, and
//! the error enums used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod issue;
pub mod rpc;
pub mod station;
