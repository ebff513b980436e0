use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{DbFeedback, DbRouteAnalytics, DbTripLog};
use crate::db::reports::{DailyPerformance, FeedbackSummary, NewFeedback, NewTripLog, RouteSummary};
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::types::{ExportKind, Panel, Role};

const MAX_DAYS: i64 = 365;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ExportRows {
    Performance(Vec<DbRouteAnalytics>),
    Trips(Vec<DbTripLog>),
    Feedback(Vec<DbFeedback>),
}

/// `[today - days, today]` in campus-local days. `days` must be 1..=365.
fn window(
    state: &AppState,
    days: Option<i64>,
    default: i64,
) -> Result<(NaiveDate, NaiveDate), TrackerError> {
    let days = days.unwrap_or(default);
    if !(1..=MAX_DAYS).contains(&days) {
        return Err(TrackerError::validation(format!(
            "days must be between 1 and {MAX_DAYS}."
        )));
    }
    let today = state.local_today(Utc::now());
    Ok((today - Duration::days(days), today))
}

/// POST /api/feedback (any signed-in user)
pub async fn submit_feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(new): Json<NewFeedback>,
) -> Result<impl IntoResponse, TrackerError> {
    let feedback = state.storage.create_feedback(user.id(), new).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// POST /api/trip-logs (admin, driver). A driver always logs as themselves.
pub async fn create_trip_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut new): Json<NewTripLog>,
) -> Result<impl IntoResponse, TrackerError> {
    user.require_any(&[Role::Admin, Role::Driver])?;
    match user.role().panel() {
        Panel::Driver => new.driver_id = Some(user.id()),
        Panel::Admin | Panel::Authority | Panel::Rider => {}
    }
    let log = state.storage.create_trip_log(new).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// GET /api/trip-logs?from=&to= (defaults to the last 30 days)
pub async fn list_trip_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<DbTripLog>>, TrackerError> {
    user.require_management()?;
    let (default_from, today) = window(&state, None, 30)?;
    let from = q.from.unwrap_or(default_from);
    let to = q.to.unwrap_or(today);
    if from > to {
        return Err(TrackerError::validation("from must not be after to."));
    }
    Ok(Json(state.storage.list_trip_logs(from, to).await?))
}

/// GET /api/reports/routes?days=30
pub async fn route_analytics(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Vec<RouteSummary>>, TrackerError> {
    user.require_management()?;
    let (from, to) = window(&state, q.days, 30)?;
    Ok(Json(state.storage.route_summaries(from, to).await?))
}

/// GET /api/reports/performance?days=7
pub async fn performance(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Vec<DailyPerformance>>, TrackerError> {
    user.require_management()?;
    let (from, to) = window(&state, q.days, 7)?;
    Ok(Json(state.storage.daily_performance(from, to).await?))
}

pub async fn feedback_summary(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<FeedbackSummary>, TrackerError> {
    user.require_management()?;
    Ok(Json(state.storage.feedback_summary().await?))
}

/// GET /api/reports/export?type=performance|trips|feedback&days=30
pub async fn export(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ExportQuery>,
) -> Result<Json<ExportRows>, TrackerError> {
    user.require_management()?;
    let kind = match q.kind.as_deref() {
        None => ExportKind::default(),
        Some(raw) => ExportKind::parse(raw).ok_or_else(|| {
            TrackerError::validation(format!(
                "Unknown export type \"{raw}\"; use performance, trips or feedback."
            ))
        })?,
    };
    let (from, to) = window(&state, q.days, 30)?;
    let rows = match kind {
        ExportKind::Performance => {
            ExportRows::Performance(state.storage.list_route_analytics(from, to).await?)
        }
        ExportKind::Trips => ExportRows::Trips(state.storage.list_trip_logs(from, to).await?),
        ExportKind::Feedback => {
            ExportRows::Feedback(state.storage.list_feedback_since(from).await?)
        }
    };
    Ok(Json(rows))
}

/// POST /api/reports/analytics/recompute, `{"date": "2025-03-01"}` or today.
pub async fn recompute_analytics(
    State(state): State<AppState>,
    admin: CurrentUser,
    body: Option<Json<RecomputeRequest>>,
) -> Result<Json<Vec<DbRouteAnalytics>>, TrackerError> {
    admin.require_admin()?;
    let date = body
        .and_then(|Json(b)| b.date)
        .unwrap_or_else(|| state.local_today(Utc::now()));
    let rows = state.storage.recompute_analytics(date).await?;
    info!(%date, routes = rows.len(), "route analytics recomputed");
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_rows_serialize_as_bare_arrays() {
        let json = serde_json::to_string(&ExportRows::Trips(Vec::new())).unwrap();
        assert_eq!(json, "[]");
    }
}
