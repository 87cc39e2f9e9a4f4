//! Axum router configuration with middleware.
//!
//! RPC routes live under `/api/v1/` behind the worker-pool limit. The
//! long-lived event streams (SSE and WebSocket) are not counted against
//! the pool. Middleware: CORS, request tracing.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::limit::limit_workers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let rpc_routes = Router::new()
        .route(
            "/stations",
            post(handlers::station::register_station).get(handlers::station::list_stations),
        )
        .route("/stations/{id}", get(handlers::station::get_quality_data))
        .route(
            "/stations/{id}/neighbors",
            get(handlers::station::get_neighbors).post(handlers::station::add_neighbor),
        )
        .route("/stations/{id}/issues", post(handlers::station::report_issue))
        .route("/stations/{id}/notify", post(handlers::station::notify_neighbors))
        .route("/events", post(handlers::events::publish_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_workers));

    let api_routes = rpc_routes.route("/events/stream", get(handlers::events::stream_events));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws/events", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
