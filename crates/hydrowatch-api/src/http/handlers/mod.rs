//! HTTP request handlers for the control service.

pub mod events;
pub mod station;
pub mod ws;
