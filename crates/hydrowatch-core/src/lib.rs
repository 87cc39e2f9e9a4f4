//! Registry, event dissemination and station agent logic for Hydrowatch.
//!
//! This crate defines the "ports" (`ControlPlane`, `EventTransport`) that
//! the infrastructure layer implements. It depends only on
//! `hydrowatch-types` -- never on `hydrowatch-infra` or any network crate.

pub mod agent;
pub mod control;
pub mod event;
pub mod registry;
pub mod sensor;
