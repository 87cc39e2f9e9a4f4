//! Observability setup shared by Hydrowatch binaries.

pub mod tracing_setup;
