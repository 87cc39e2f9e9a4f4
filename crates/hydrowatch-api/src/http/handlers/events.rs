//! Event relay and Server-Sent Events stream.
//!
//! Stations publish sensor alerts and heartbeats with `POST /api/v1/events`;
//! anyone can follow the whole bus with `GET /api/v1/events/stream`. Each
//! SSE message is named after the event's wire `type` and carries the
//! event JSON as data.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use tokio::sync::broadcast;

use hydrowatch_types::event::StationEvent;
use hydrowatch_types::rpc::StatusResponse;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/events - Put a station-originated event on the bus.
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<StationEvent>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let timer = RequestTimer::start();

    if !event.is_station_originated() {
        return Err(AppError::Validation(format!(
            "'{}' events can only be emitted by the registry",
            event.kind()
        )));
    }

    let kind = event.kind();
    let receivers = state.bus.publish(event);
    tracing::debug!(kind, receivers, "relayed station event");

    Ok(Json(timer.respond(StatusResponse::ok(format!(
        "Event delivered to {receivers} subscriber(s)"
    )))))
}

/// GET /api/v1/events/stream - Every bus event as SSE.
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.bus.subscribe();
    let cancel = state.cancel.clone();

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => received,
            };

            match received {
                Ok(event) => match Event::default().event(event.kind()).json_data(&event) {
                    Ok(sse) => yield Ok::<_, Infallible>(sse),
                    Err(e) => tracing::warn!(error = %e, "failed to encode SSE event"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "SSE subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("SSE stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
