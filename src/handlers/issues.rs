use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use crate::db::issues::{IssueFilter, IssueUpdate, NewIssue};
use crate::db::models::{DbIssue, DbIssueComment};
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::types::{IssuePriority, IssueType, Panel};

#[derive(Debug, Deserialize)]
pub struct ReportIssueRequest {
    pub issue_type: IssueType,
    pub description: String,
    #[serde(default)]
    pub priority: IssuePriority,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub resolution_notes: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// Load an issue the caller may look at: management sees every issue, a
/// driver only the ones they reported.
async fn viewable_issue(
    state: &AppState,
    user: &CurrentUser,
    id: i64,
) -> Result<DbIssue, TrackerError> {
    let issue = state.storage.get_issue(id).await?;
    match user.role().panel() {
        Panel::Admin | Panel::Authority => Ok(issue),
        Panel::Driver if issue.reported_by == user.id() => Ok(issue),
        Panel::Driver | Panel::Rider => Err(TrackerError::Forbidden),
    }
}

/// POST /api/issues. Bus and route are taken from the driver's active
/// assignment when there is one.
pub async fn report_issue(
    State(state): State<AppState>,
    driver: CurrentUser,
    Json(req): Json<ReportIssueRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    driver.require_driver()?;
    let assignment = state
        .storage
        .active_assignment_for_driver(driver.id())
        .await?;
    let issue = state
        .storage
        .create_issue(NewIssue {
            issue_type: req.issue_type,
            description: req.description,
            reported_by: driver.id(),
            bus_id: assignment.as_ref().map(|a| a.bus_id),
            route_id: assignment.as_ref().map(|a| a.route_id),
            latitude: req.latitude,
            longitude: req.longitude,
            priority: req.priority,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

/// GET /api/issues?status=pending&issue_type=traffic
pub async fn list_issues(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(mut filter): Query<IssueFilter>,
) -> Result<Json<Vec<DbIssue>>, TrackerError> {
    match user.role().panel() {
        Panel::Admin | Panel::Authority => {}
        Panel::Driver => filter.reported_by = Some(user.id()),
        Panel::Rider => return Ok(Json(Vec::new())),
    }
    Ok(Json(state.storage.list_issues(&filter).await?))
}

pub async fn get_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbIssue>, TrackerError> {
    Ok(Json(viewable_issue(&state, &user, id).await?))
}

/// PATCH /api/issues/{id}: status, priority and notes (admin, authority).
pub async fn update_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(upd): Json<IssueUpdate>,
) -> Result<Json<DbIssue>, TrackerError> {
    user.require_management()?;
    Ok(Json(state.storage.update_issue(id, upd).await?))
}

/// POST /api/issues/{id}/assign -> the admin takes the issue.
pub async fn assign_issue(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbIssue>, TrackerError> {
    admin.require_admin()?;
    let issue = state.storage.assign_issue(id, admin.id()).await?;
    info!(issue_id = id, assigned_to = admin.id(), "issue assigned");
    Ok(Json(issue))
}

pub async fn resolve_issue(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    body: Option<Json<ResolveRequest>>,
) -> Result<Json<DbIssue>, TrackerError> {
    admin.require_admin()?;
    let notes = body.map(|Json(b)| b.resolution_notes).unwrap_or_default();
    Ok(Json(state.storage.resolve_issue(id, notes).await?))
}

pub async fn list_comments(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DbIssueComment>>, TrackerError> {
    let issue = viewable_issue(&state, &user, id).await?;
    Ok(Json(state.storage.list_issue_comments(issue.id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    let issue = viewable_issue(&state, &user, id).await?;
    let comment = state
        .storage
        .add_issue_comment(issue.id, user.id(), req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
