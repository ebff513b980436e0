use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::db::models::{DbInboxEntry, DbNotification};
use crate::db::notifications::{NewNotification, NotificationPatch};
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedNotification {
    pub notification: DbNotification,
    pub recipients: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub marked: u64,
}

/// GET /api/notifications -> the feed for the caller's role.
pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DbNotification>>, TrackerError> {
    Ok(Json(
        state
            .storage
            .list_visible_notifications(user.role())
            .await?,
    ))
}

/// POST /api/notifications (admin, authority), fanned out to every recipient.
pub async fn create_notification(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(new): Json<NewNotification>,
) -> Result<impl IntoResponse, TrackerError> {
    user.require_management()?;
    let (notification, recipients) = state.storage.create_notification(new, user.id()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedNotification {
            notification,
            recipients,
        }),
    ))
}

pub async fn inbox(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DbInboxEntry>>, TrackerError> {
    Ok(Json(state.storage.inbox(user.id()).await?))
}

pub async fn unread(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DbInboxEntry>>, TrackerError> {
    Ok(Json(state.storage.unread_notifications(user.id()).await?))
}

pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UnreadCount>, TrackerError> {
    let count = state.storage.unread_count(user.id()).await?;
    Ok(Json(UnreadCount { count }))
}

/// POST /api/notifications/{id}/read. Works for anything in the caller's
/// inbox or feed; other notifications are reported as missing.
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    let notification = state.storage.get_notification(id).await?;
    if !notification.audience.reaches(user.role()) {
        let in_inbox = state
            .storage
            .inbox(user.id())
            .await?
            .iter()
            .any(|entry| entry.notification_id == id);
        if !in_inbox {
            return Err(TrackerError::NotFound("Notification"));
        }
    }
    state.storage.mark_notification_read(id, user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MarkedRead>, TrackerError> {
    let marked = state.storage.mark_all_notifications_read(user.id()).await?;
    Ok(Json(MarkedRead { marked }))
}

pub async fn update_notification(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<NotificationPatch>,
) -> Result<Json<DbNotification>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.update_notification(id, patch).await?))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    state.storage.delete_notification(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
