//! HTTP/REST surface of the control service.
//!
//! Axum-based RPC routes at `/api/v1/`, envelope response format, a
//! bounded worker pool, plus SSE and WebSocket event streams.

pub mod error;
pub mod handlers;
pub mod limit;
pub mod response;
pub mod router;
