use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::fleet::BusInput;
use crate::db::models::{DbBus, DbBusLocation, DbStop};
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::service::eta::EtaOutcome;

const RECENT_LOCATIONS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct BusQuery {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct BusDetail {
    #[serde(flatten)]
    pub bus: DbBus,
    pub recent_locations: Vec<DbBusLocation>,
}

#[derive(Debug, Serialize)]
pub struct BusEta {
    pub bus_id: i64,
    pub stop: DbStop,
    pub eta: EtaOutcome,
}

/// GET /api/buses?is_active=true
pub async fn list_buses(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(q): Query<BusQuery>,
) -> Result<Json<Vec<DbBus>>, TrackerError> {
    Ok(Json(state.storage.list_buses(q.is_active).await?))
}

pub async fn get_bus(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<BusDetail>, TrackerError> {
    let bus = state.storage.get_bus(id).await?;
    let recent_locations = state.storage.recent_locations(bus.id, RECENT_LOCATIONS).await?;
    Ok(Json(BusDetail {
        bus,
        recent_locations,
    }))
}

pub async fn create_bus(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(input): Json<BusInput>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let bus = state.storage.create_bus(input).await?;
    info!(bus_id = bus.id, bus = %bus.bus_number, "bus created");
    Ok((StatusCode::CREATED, Json(bus)))
}

pub async fn update_bus(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<BusInput>,
) -> Result<Json<DbBus>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.update_bus(id, input).await?))
}

pub async fn delete_bus(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    state.storage.delete_bus(id).await?;
    info!(bus_id = id, "bus deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/buses/{id}/location -> latest live position, 404 when stale.
pub async fn bus_location(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbBusLocation>, TrackerError> {
    let bus = state.storage.get_bus(id).await?;
    state
        .storage
        .live_location(bus.id, state.active_window_secs)
        .await?
        .map(Json)
        .ok_or(TrackerError::NotFound("Live location"))
}

/// GET /api/buses/{id}/eta/{stop_id}
pub async fn bus_eta(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((id, stop_id)): Path<(i64, i64)>,
) -> Result<Json<BusEta>, TrackerError> {
    let bus = state.storage.get_bus(id).await?;
    let stop = state.storage.get_stop(stop_id).await?;
    let location = state.storage.latest_location(bus.id).await?;
    let eta = state.eta.estimate(location.as_ref(), &stop, Utc::now());
    Ok(Json(BusEta {
        bus_id: bus.id,
        stop,
        eta,
    }))
}
