use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::models::{DbRoute, DbSchedule, DbStop, DbTrip};
use crate::db::routes::{NewTrip, RouteInput, ScheduleFilter, StopInput};
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::service::eta::EtaOutcome;
use crate::types::DayOfWeek;

#[derive(Debug, Serialize)]
pub struct StopEta {
    pub stop: DbStop,
    pub eta: EtaOutcome,
}

#[derive(Debug, Serialize)]
pub struct RouteEta {
    pub route_id: i64,
    pub bus_id: Option<i64>,
    pub stops: Vec<StopEta>,
}

/// Riders only ever see active, published routes; anything else is 404.
async fn visible_route(
    state: &AppState,
    user: &CurrentUser,
    id: i64,
) -> Result<DbRoute, TrackerError> {
    let route = state.storage.get_route(id).await?;
    if user.role().is_regular() && !(route.is_active && route.is_published) {
        return Err(TrackerError::NotFound("Route"));
    }
    Ok(route)
}

/// GET /api/routes
pub async fn list_routes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DbRoute>>, TrackerError> {
    let published_only = user.role().is_regular();
    Ok(Json(state.storage.list_routes(published_only).await?))
}

pub async fn get_route(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbRoute>, TrackerError> {
    Ok(Json(visible_route(&state, &user, id).await?))
}

pub async fn create_route(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(input): Json<RouteInput>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let route = state.storage.create_route(input).await?;
    info!(route_id = route.id, name = %route.name, "route created");
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn update_route(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<RouteInput>,
) -> Result<Json<DbRoute>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.update_route(id, input).await?))
}

pub async fn delete_route(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    state.storage.delete_route(id).await?;
    info!(route_id = id, "route deleted");
    Ok(StatusCode::NO_CONTENT)
}

// stops

pub async fn list_stops(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DbStop>>, TrackerError> {
    let route = visible_route(&state, &user, id).await?;
    Ok(Json(state.storage.list_stops(route.id).await?))
}

pub async fn create_stop(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<StopInput>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let stop = state.storage.create_stop(id, input).await?;
    Ok((StatusCode::CREATED, Json(stop)))
}

pub async fn update_stop(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<StopInput>,
) -> Result<Json<DbStop>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.update_stop(id, input).await?))
}

pub async fn delete_stop(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    state.storage.delete_stop(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// trips

pub async fn list_trips(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DbTrip>>, TrackerError> {
    let route = visible_route(&state, &user, id).await?;
    Ok(Json(state.storage.list_trips(route.id).await?))
}

pub async fn create_trip(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(trip): Json<NewTrip>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let trip = state.storage.create_trip(id, trip).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

pub async fn delete_trip(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    state.storage.delete_trip(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/routes/{id}/eta
///
/// ETA of the route's assigned bus to every stop. With no bus on the route
/// each stop reports `unavailable`.
pub async fn route_eta(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<RouteEta>, TrackerError> {
    let route = visible_route(&state, &user, id).await?;
    let bus_id = state
        .storage
        .active_assignment_for_route(route.id)
        .await?
        .map(|a| a.bus_id);
    let location = match bus_id {
        Some(bus_id) => state.storage.latest_location(bus_id).await?,
        None => None,
    };
    let now = Utc::now();
    let stops = state
        .storage
        .list_stops(route.id)
        .await?
        .into_iter()
        .map(|stop| StopEta {
            eta: state.eta.estimate(location.as_ref(), &stop, now),
            stop,
        })
        .collect();
    Ok(Json(RouteEta {
        route_id: route.id,
        bus_id,
        stops,
    }))
}

// schedules

/// GET /api/schedules?day=mon&route_id=1
pub async fn list_schedules(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<Vec<DbSchedule>>, TrackerError> {
    Ok(Json(state.storage.list_schedules(&filter).await?))
}

/// GET /api/schedules/today, using the campus-local weekday.
pub async fn today_schedules(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbSchedule>>, TrackerError> {
    let filter = ScheduleFilter {
        day: Some(DayOfWeek::from(state.local_today(Utc::now()).weekday())),
        route_id: None,
    };
    Ok(Json(state.storage.list_schedules(&filter).await?))
}
