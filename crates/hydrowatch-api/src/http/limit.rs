//! Bounded worker pool for RPC routes.
//!
//! At most `max_workers` requests run at once; the rest wait for a permit
//! in arrival order.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use hydrowatch_types::error::ControlError;

use crate::http::error::AppError;
use crate::state::AppState;

pub async fn limit_workers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Ok(_permit) = state.workers.clone().acquire_owned().await else {
        return AppError::Control(ControlError::Unavailable(
            "worker pool closed".to_string(),
        ))
        .into_response();
    };
    next.run(request).await
}
