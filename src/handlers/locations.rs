use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::locations::{NewLocation, SimulationStatus};
use crate::db::models::{DbBusLocation, DbNotification};
use crate::db::notifications::NewNotification;
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::types::{Audience, NotificationPriority};

const DEFAULT_DELAY_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
}

/// POST /api/locations. The bus comes from the driver's active assignment.
pub async fn report_location(
    State(state): State<AppState>,
    driver: CurrentUser,
    Json(report): Json<LocationReport>,
) -> Result<impl IntoResponse, TrackerError> {
    driver.require_driver()?;
    let Some(assignment) = state
        .storage
        .active_assignment_for_driver(driver.id())
        .await?
    else {
        return Err(TrackerError::validation(
            "You have no active bus assignment.",
        ));
    };
    let location = state
        .storage
        .insert_location(NewLocation {
            bus_id: assignment.bus_id,
            driver_id: Some(driver.id()),
            latitude: report.latitude,
            longitude: report.longitude,
            speed_kmh: report.speed_kmh,
            heading: report.heading,
            is_simulated: false,
        })
        .await?;
    debug!(bus_id = location.bus_id, driver_id = driver.id(), "location reported");
    Ok((StatusCode::CREATED, Json(location)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DelayReport {
    pub delay_minutes: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DelayAlert {
    pub notification: DbNotification,
    pub recipients: u64,
}

/// POST /api/locations/delay. Broadcasts a warning for the driver's active
/// bus and route to everyone.
pub async fn report_delay(
    State(state): State<AppState>,
    driver: CurrentUser,
    body: Option<Json<DelayReport>>,
) -> Result<impl IntoResponse, TrackerError> {
    driver.require_driver()?;
    let report = body.map(|Json(r)| r).unwrap_or_default();
    let delay_minutes = report.delay_minutes.unwrap_or(DEFAULT_DELAY_MINUTES);
    if !(1..=24 * 60).contains(&delay_minutes) {
        return Err(TrackerError::validation(
            "delay_minutes must be between 1 and 1440.",
        ));
    }
    let Some(assignment) = state
        .storage
        .active_assignment_for_driver(driver.id())
        .await?
    else {
        return Err(TrackerError::validation(
            "You have no active bus assignment.",
        ));
    };
    let bus = state.storage.get_bus(assignment.bus_id).await?;
    let route = state.storage.get_route(assignment.route_id).await?;

    let mut message = format!(
        "Bus {} on route {} is delayed by approximately {} minutes.",
        bus.bus_number, route.name, delay_minutes
    );
    if let Some(reason) = report.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        message.push(' ');
        message.push_str(reason);
    }
    let (notification, recipients) = state
        .storage
        .create_notification(
            NewNotification {
                title: format!("Delay Alert: {}", route.name),
                message,
                priority: NotificationPriority::Warning,
                audience: Audience::All,
                target_route_id: None,
                expires_at: None,
            },
            driver.id(),
        )
        .await?;
    info!(
        bus_id = bus.id,
        route_id = route.id,
        delay_minutes,
        recipients,
        "delay reported"
    );
    Ok((
        StatusCode::CREATED,
        Json(DelayAlert {
            notification,
            recipients,
        }),
    ))
}

/// GET /api/locations/active
pub async fn active_locations(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbBusLocation>>, TrackerError> {
    Ok(Json(
        state
            .storage
            .active_bus_locations(state.active_window_secs)
            .await?,
    ))
}

/// GET /api/locations/status -> how many live buses are real vs simulated.
pub async fn simulation_status(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<SimulationStatus>, TrackerError> {
    Ok(Json(
        state
            .storage
            .simulation_status(state.active_window_secs)
            .await?,
    ))
}
