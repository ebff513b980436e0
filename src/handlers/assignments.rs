use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::db::fleet::NewAssignment;
use crate::db::models::DbAssignment;
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;

pub async fn list_assignments(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DbAssignment>>, TrackerError> {
    user.require_management()?;
    Ok(Json(state.storage.list_assignments().await?))
}

/// POST /api/assignments -> 409 when the driver, bus or route is taken.
pub async fn create_assignment(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(new): Json<NewAssignment>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let assignment = state.storage.create_assignment(new).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// POST /api/buses/{id}/assignment/clear
pub async fn clear_assignment(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(bus_id): Path<i64>,
) -> Result<Json<DbAssignment>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.clear_bus_assignment(bus_id).await?))
}

/// GET /api/assignments/mine -> `null` when the driver has no active assignment.
pub async fn my_assignment(
    State(state): State<AppState>,
    driver: CurrentUser,
) -> Result<Json<Option<DbAssignment>>, TrackerError> {
    driver.require_driver()?;
    Ok(Json(
        state.storage.active_assignment_for_driver(driver.id()).await?,
    ))
}

pub async fn start_shift(
    State(state): State<AppState>,
    driver: CurrentUser,
) -> Result<Json<DbAssignment>, TrackerError> {
    driver.require_driver()?;
    let assignment = state.storage.mark_shift(driver.id(), true).await?;
    info!(driver_id = driver.id(), assignment_id = assignment.id, "shift started");
    Ok(Json(assignment))
}

pub async fn end_shift(
    State(state): State<AppState>,
    driver: CurrentUser,
) -> Result<Json<DbAssignment>, TrackerError> {
    driver.require_driver()?;
    let assignment = state.storage.mark_shift(driver.id(), false).await?;
    info!(driver_id = driver.id(), assignment_id = assignment.id, "shift ended");
    Ok(Json(assignment))
}
