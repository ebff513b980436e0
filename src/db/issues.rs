use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use crate::db::models::{DbIssue, DbIssueComment};
use crate::db::routes::validate_coordinates;
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{IssuePriority, IssueStatus, IssueType};

const ISSUE_COLUMNS: &str = "id, issue_type, description, reported_by, bus_id, route_id, \
     latitude, longitude, status, priority, assigned_to, resolution_notes, created_at, \
     updated_at, resolved_at";

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub issue_type: IssueType,
    pub description: String,
    pub reported_by: i64,
    pub bus_id: Option<i64>,
    pub route_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub priority: IssuePriority,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFilter {
    /// Restrict to issues reported by this user.
    #[serde(skip)]
    pub reported_by: Option<i64>,
    pub status: Option<IssueStatus>,
    pub issue_type: Option<IssueType>,
    #[serde(skip)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueUpdate {
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub resolution_notes: Option<String>,
    #[serde(skip)]
    pub assigned_to: Option<i64>,
}

impl Storage {
    pub async fn create_issue(&self, new: NewIssue) -> Result<DbIssue, TrackerError> {
        if new.description.trim().is_empty() {
            return Err(TrackerError::validation("Description is required."));
        }
        if let (Some(lat), Some(lon)) = (new.latitude, new.longitude) {
            validate_coordinates(lat, lon)?;
        }
        let now = Utc::now();
        let res = sqlx::query(
            r#"INSERT INTO issues (
                issue_type, description, reported_by, bus_id, route_id, latitude, longitude,
                status, priority, created_at, updated_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new.issue_type)
        .bind(new.description)
        .bind(new.reported_by)
        .bind(new.bus_id)
        .bind(new.route_id)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(IssueStatus::Pending)
        .bind(new.priority)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        let id = res.last_insert_rowid();
        info!(issue_id = id, issue_type = ?new.issue_type, "issue reported");
        self.get_issue(id).await
    }

    pub async fn get_issue(&self, id: i64) -> Result<DbIssue, TrackerError> {
        sqlx::query_as::<_, DbIssue>(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(TrackerError::NotFound("Issue"))
    }

    pub async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<DbIssue>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE 1 = 1"));
        if let Some(user) = filter.reported_by {
            qb.push(" AND reported_by = ").push_bind(user);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(kind) = filter.issue_type {
            qb.push(" AND issue_type = ").push_bind(kind);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }
        Ok(qb.build_query_as::<DbIssue>().fetch_all(self.pool()).await?)
    }

    /// Apply a status/priority/notes change. The status move must be legal
    /// for the state machine; entering `resolved` stamps `resolved_at`.
    pub async fn update_issue(&self, id: i64, upd: IssueUpdate) -> Result<DbIssue, TrackerError> {
        let cur = self.get_issue(id).await?;
        let status = upd.status.unwrap_or(cur.status);
        if !cur.status.can_transition_to(status) {
            return Err(TrackerError::InvalidTransition {
                from: cur.status,
                to: status,
            });
        }
        let now = Utc::now();
        let resolved_at = match (cur.status, status) {
            (from, IssueStatus::Resolved) if from != IssueStatus::Resolved => Some(now),
            _ => cur.resolved_at,
        };
        sqlx::query(
            r#"UPDATE issues SET
                status = ?, priority = ?, resolution_notes = ?, assigned_to = ?,
                resolved_at = ?, updated_at = ?
              WHERE id = ?"#,
        )
        .bind(status)
        .bind(upd.priority.unwrap_or(cur.priority))
        .bind(upd.resolution_notes.unwrap_or(cur.resolution_notes))
        .bind(upd.assigned_to.or(cur.assigned_to))
        .bind(resolved_at)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;
        if status != cur.status {
            info!(issue_id = id, from = %cur.status, to = %status, "issue status changed");
        }
        self.get_issue(id).await
    }

    /// Take the issue: assign it to `user_id` and move it to in progress.
    pub async fn assign_issue(&self, id: i64, user_id: i64) -> Result<DbIssue, TrackerError> {
        self.update_issue(
            id,
            IssueUpdate {
                status: Some(IssueStatus::InProgress),
                assigned_to: Some(user_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn resolve_issue(&self, id: i64, notes: String) -> Result<DbIssue, TrackerError> {
        self.update_issue(
            id,
            IssueUpdate {
                status: Some(IssueStatus::Resolved),
                resolution_notes: Some(notes),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn count_open_issues(&self) -> Result<i64, TrackerError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM issues WHERE status IN (?, ?)")
                .bind(IssueStatus::Pending)
                .bind(IssueStatus::InProgress)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    pub async fn add_issue_comment(
        &self,
        issue_id: i64,
        user_id: i64,
        body: String,
    ) -> Result<DbIssueComment, TrackerError> {
        if body.trim().is_empty() {
            return Err(TrackerError::validation("Comment cannot be empty."));
        }
        let res = sqlx::query(
            "INSERT INTO issue_comments (issue_id, user_id, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(issue_id)
        .bind(user_id)
        .bind(body)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        let row = sqlx::query_as::<_, DbIssueComment>(
            "SELECT id, issue_id, user_id, body, created_at FROM issue_comments WHERE id = ?",
        )
        .bind(res.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_issue_comments(
        &self,
        issue_id: i64,
    ) -> Result<Vec<DbIssueComment>, TrackerError> {
        let rows = sqlx::query_as::<_, DbIssueComment>(
            "SELECT id, issue_id, user_id, body, created_at FROM issue_comments \
             WHERE issue_id = ? ORDER BY created_at, id",
        )
        .bind(issue_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
