use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::db::models::{DbInboxEntry, DbNotification};
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{Audience, NotificationPriority, Role};

const NOTIFICATION_COLUMNS: &str = "id, title, message, priority, audience, target_route_id, \
     created_by, is_active, expires_at, created_at, updated_at";

const INBOX_SELECT: &str = "SELECT n.id AS notification_id, n.title, n.message, n.priority, \
     un.is_read, un.read_at, n.created_at \
     FROM user_notifications AS un JOIN notifications AS n ON n.id = un.notification_id \
     WHERE un.user_id = ? AND n.is_active = 1 AND (n.expires_at IS NULL OR n.expires_at > ?)";

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub audience: Audience,
    pub target_route_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub priority: Option<NotificationPriority>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Storage {
    /// Persist a notification and fan it out to its recipients in one
    /// transaction. Returns the notification and the number of inbox rows
    /// created.
    pub async fn create_notification(
        &self,
        new: NewNotification,
        created_by: i64,
    ) -> Result<(DbNotification, u64), TrackerError> {
        if new.title.trim().is_empty() || new.message.trim().is_empty() {
            return Err(TrackerError::validation("Title and message are required."));
        }
        let target_route_id = match (new.audience, new.target_route_id) {
            (Audience::Route, Some(route_id)) => {
                self.get_route(route_id).await?;
                Some(route_id)
            }
            (Audience::Route, None) => {
                return Err(TrackerError::validation(
                    "A target route is required for route notifications.",
                ));
            }
            (Audience::All | Audience::Users | Audience::Drivers, _) => None,
        };

        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        let res = sqlx::query(
            r#"INSERT INTO notifications (
                title, message, priority, audience, target_route_id, created_by, is_active,
                expires_at, created_at, updated_at
              ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)"#,
        )
        .bind(new.title)
        .bind(new.message)
        .bind(new.priority)
        .bind(new.audience)
        .bind(target_route_id)
        .bind(created_by)
        .bind(new.expires_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = res.last_insert_rowid();
        let recipients = fan_out(&mut tx, id, new.audience, target_route_id).await?;
        tx.commit().await?;

        info!(notification_id = id, audience = new.audience.as_str(), recipients, "notification sent");
        Ok((self.get_notification(id).await?, recipients))
    }

    pub async fn get_notification(&self, id: i64) -> Result<DbNotification, TrackerError> {
        sqlx::query_as::<_, DbNotification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or(TrackerError::NotFound("Notification"))
    }

    /// Active, unexpired notifications whose audience the role can see.
    pub async fn list_visible_notifications(
        &self,
        role: Role,
    ) -> Result<Vec<DbNotification>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE is_active = 1 AND (expires_at IS NULL OR expires_at > "
        ));
        qb.push_bind(Utc::now()).push(")");
        if let Some(audiences) = Audience::visible_to(role) {
            qb.push(" AND audience IN (");
            let mut sep = qb.separated(", ");
            for audience in audiences {
                sep.push_bind(*audience);
            }
            sep.push_unseparated(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        Ok(qb.build_query_as::<DbNotification>().fetch_all(self.pool()).await?)
    }

    pub async fn inbox(&self, user_id: i64) -> Result<Vec<DbInboxEntry>, TrackerError> {
        let rows = sqlx::query_as::<_, DbInboxEntry>(&format!(
            "{INBOX_SELECT} ORDER BY n.created_at DESC, n.id DESC"
        ))
        .bind(user_id)
        .bind(Utc::now())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn unread_notifications(
        &self,
        user_id: i64,
    ) -> Result<Vec<DbInboxEntry>, TrackerError> {
        let rows = sqlx::query_as::<_, DbInboxEntry>(&format!(
            "{INBOX_SELECT} AND un.is_read = 0 ORDER BY n.created_at DESC, n.id DESC"
        ))
        .bind(user_id)
        .bind(Utc::now())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, TrackerError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM ({INBOX_SELECT} AND un.is_read = 0)"
        ))
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Mark one notification read for the user, creating the inbox row when
    /// the user was not part of the original fan-out.
    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<(), TrackerError> {
        self.get_notification(notification_id).await?;
        sqlx::query(
            r#"INSERT INTO user_notifications (notification_id, user_id, is_read, read_at)
               VALUES (?, ?, 1, ?)
               ON CONFLICT (notification_id, user_id)
               DO UPDATE SET is_read = 1, read_at = COALESCE(read_at, excluded.read_at)"#,
        )
        .bind(notification_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64, TrackerError> {
        let res = sqlx::query(
            "UPDATE user_notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND is_read = 0",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn update_notification(
        &self,
        id: i64,
        patch: NotificationPatch,
    ) -> Result<DbNotification, TrackerError> {
        let cur = self.get_notification(id).await?;
        sqlx::query(
            r#"UPDATE notifications SET
                title = ?, message = ?, priority = ?, is_active = ?, expires_at = ?, updated_at = ?
              WHERE id = ?"#,
        )
        .bind(patch.title.unwrap_or(cur.title))
        .bind(patch.message.unwrap_or(cur.message))
        .bind(patch.priority.unwrap_or(cur.priority))
        .bind(patch.is_active.unwrap_or(cur.is_active))
        .bind(patch.expires_at.or(cur.expires_at))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        self.get_notification(id).await
    }

    pub async fn delete_notification(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Notification"));
        }
        Ok(())
    }
}

async fn fan_out(
    conn: &mut SqliteConnection,
    notification_id: i64,
    audience: Audience,
    target_route_id: Option<i64>,
) -> Result<u64, TrackerError> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT OR IGNORE INTO user_notifications (notification_id, user_id, is_read) SELECT ",
    );
    qb.push_bind(notification_id);
    match audience {
        Audience::All => {
            qb.push(", u.id, 0 FROM users AS u WHERE u.is_active = 1");
        }
        Audience::Users => {
            qb.push(", u.id, 0 FROM users AS u WHERE u.is_active = 1 AND u.role IN (");
            let mut sep = qb.separated(", ");
            for role in Role::REGULAR {
                sep.push_bind(role);
            }
            sep.push_unseparated(")");
        }
        Audience::Drivers => {
            qb.push(", u.id, 0 FROM users AS u WHERE u.is_active = 1 AND u.role = ")
                .push_bind(Role::Driver);
        }
        Audience::Route => {
            qb.push(
                ", d.driver_id, 0 FROM (\
                   SELECT DISTINCT a.driver_id FROM bus_assignments AS a \
                   JOIN users AS u ON u.id = a.driver_id \
                   WHERE a.is_active = 1 AND u.is_active = 1 AND a.route_id = ",
            )
            .push_bind(target_route_id)
            .push(") AS d");
        }
    }
    let res = qb.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}
