//! Station RPC handlers.
//!
//! Each handler goes through [`ControlPlane`] on the registry handle, so
//! the HTTP surface answers exactly like the in-process control plane.

use axum::extract::{Path, State};
use axum::Json;

use hydrowatch_core::control::ControlPlane;
use hydrowatch_types::rpc::{
    AddNeighborRequest, IssueReport, NeighborList, NeighborNotification, QualityDataResponse,
    RegisterStationRequest, StationSummary, StatusResponse,
};
use hydrowatch_types::station::StationId;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// POST /api/v1/stations - Register a station.
pub async fn register_station(
    State(state): State<AppState>,
    Json(body): Json<RegisterStationRequest>,
) -> ApiResult<StatusResponse> {
    let timer = RequestTimer::start();
    let status = ControlPlane::register(&state.registry, &body.station_id, &body.sensors).await?;

    let self_link = format!("/api/v1/stations/{}", body.station_id);
    Ok(Json(timer.respond(status).with_link("self", &self_link)))
}

/// GET /api/v1/stations - List every registered station.
pub async fn list_stations(State(state): State<AppState>) -> ApiResult<Vec<StationSummary>> {
    let timer = RequestTimer::start();
    let stations = ControlPlane::list_stations(&state.registry).await?;
    Ok(Json(timer.respond(stations).with_link("self", "/api/v1/stations")))
}

/// GET /api/v1/stations/{id} - Current quality data and status.
pub async fn get_quality_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<QualityDataResponse> {
    let timer = RequestTimer::start();
    let station_id = StationId::from(id);
    let data = state.registry.quality_data(&station_id).await?;

    let neighbors_link = format!("/api/v1/stations/{station_id}/neighbors");
    Ok(Json(timer.respond(data).with_link("neighbors", &neighbors_link)))
}

/// GET /api/v1/stations/{id}/neighbors
pub async fn get_neighbors(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NeighborList> {
    let timer = RequestTimer::start();
    let station_id = StationId::from(id);
    let neighbors = ControlPlane::neighbors(&state.registry, &station_id).await?;

    Ok(Json(timer.respond(NeighborList {
        station_id,
        neighbors,
    })))
}

/// POST /api/v1/stations/{id}/neighbors - Link two stations both ways.
pub async fn add_neighbor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddNeighborRequest>,
) -> ApiResult<StatusResponse> {
    let timer = RequestTimer::start();
    let station_id = StationId::from(id);
    let status =
        ControlPlane::add_neighbor(&state.registry, &station_id, &body.neighbour_id).await?;
    Ok(Json(timer.respond(status)))
}

/// POST /api/v1/stations/{id}/issues - Report an issue.
///
/// Duplicate reports answer `success: false`, not an error. An unknown
/// station is created by its first report.
pub async fn report_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IssueReport>,
) -> ApiResult<StatusResponse> {
    let timer = RequestTimer::start();
    let station_id = StationId::from(id);
    let status = ControlPlane::report_issue(
        &state.registry,
        &station_id,
        &body.issue_type,
        body.timestamp,
    )
    .await?;
    Ok(Json(timer.respond(status)))
}

/// POST /api/v1/stations/{id}/notify - Fan an issue out to neighbors.
pub async fn notify_neighbors(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NeighborNotification>,
) -> ApiResult<StatusResponse> {
    let timer = RequestTimer::start();
    let station_id = StationId::from(id);
    let status =
        ControlPlane::notify_neighbors(&state.registry, &station_id, &body.issue_type).await?;
    Ok(Json(timer.respond(status)))
}
