use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::db::models::{DbDriverProfile, DbUser};
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{ApprovalStatus, Role};

const USER_COLUMNS: &str = "id, username, password_hash, full_name, email, phone, role, \
     university_id, employee_id, approval_status, approved_by, approved_at, rejection_reason, \
     is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub university_id: Option<String>,
    pub employee_id: Option<String>,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
}

/// Fields an admin may change on an existing account.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewDriverProfile {
    pub license_number: String,
    pub license_expiry: Option<NaiveDate>,
    pub emergency_contact: Option<String>,
    pub years_experience: i64,
}

impl Storage {
    pub async fn create_user(&self, user: NewUser) -> Result<DbUser, TrackerError> {
        let now = Utc::now();
        let username = user.username.clone();
        let res = sqlx::query(
            r#"
            INSERT INTO users (
                username, password_hash, full_name, email, phone, role,
                university_id, employee_id, approval_status, is_active,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.role)
        .bind(user.university_id)
        .bind(user.employee_id)
        .bind(user.approval_status)
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(TrackerError::on_unique(format!(
            "Username \"{username}\" is already taken."
        )))?;
        self.get_user(res.last_insert_rowid()).await
    }

    pub async fn get_user(&self, id: i64) -> Result<DbUser, TrackerError> {
        sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(TrackerError::NotFound("User"))
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<DbUser>, TrackerError> {
        let user = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<DbUser>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role);
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        Ok(qb.build_query_as::<DbUser>().fetch_all(self.pool()).await?)
    }

    pub async fn list_pending_users(&self) -> Result<Vec<DbUser>, TrackerError> {
        let rows = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE approval_status = ? ORDER BY created_at DESC"
        ))
        .bind(ApprovalStatus::Pending)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Move a pending registration to approved or rejected. `approved_by` and
    /// `approved_at` record the deciding admin for either outcome. Accounts
    /// that are not pending are reported as not found.
    pub async fn decide_registration(
        &self,
        id: i64,
        approver: i64,
        approve: bool,
        reason: Option<String>,
    ) -> Result<DbUser, TrackerError> {
        let now = Utc::now();
        let (status, active) = if approve {
            (ApprovalStatus::Approved, true)
        } else {
            (ApprovalStatus::Rejected, false)
        };
        let res = sqlx::query(
            r#"UPDATE users SET
                approval_status = ?,
                is_active = ?,
                approved_by = ?,
                approved_at = ?,
                rejection_reason = ?,
                updated_at = ?
              WHERE id = ? AND approval_status = ?"#,
        )
        .bind(status)
        .bind(active)
        .bind(approver)
        .bind(now)
        .bind(reason)
        .bind(now)
        .bind(id)
        .bind(ApprovalStatus::Pending)
        .execute(self.pool())
        .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Pending registration"));
        }
        self.get_user(id).await
    }

    pub async fn update_user(&self, id: i64, patch: UserPatch) -> Result<DbUser, TrackerError> {
        let current = self.get_user(id).await?;
        sqlx::query(
            r#"UPDATE users SET
                full_name = ?,
                email = ?,
                phone = ?,
                role = ?,
                is_active = ?,
                password_hash = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(patch.full_name.unwrap_or(current.full_name))
        .bind(patch.email.or(current.email))
        .bind(patch.phone.or(current.phone))
        .bind(patch.role.unwrap_or(current.role))
        .bind(patch.is_active.unwrap_or(current.is_active))
        .bind(patch.password_hash.unwrap_or(current.password_hash))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        self.get_user(id).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("User"));
        }
        Ok(())
    }

    pub async fn count_users_with_roles(&self, roles: &[Role]) -> Result<i64, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM users WHERE role IN (");
        let mut sep = qb.separated(", ");
        for role in roles {
            sep.push_bind(*role);
        }
        sep.push_unseparated(")");
        let (count,): (i64,) = qb.build_query_as().fetch_one(self.pool()).await?;
        Ok(count)
    }

    pub async fn count_pending_users(&self) -> Result<i64, TrackerError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE approval_status = ?")
                .bind(ApprovalStatus::Pending)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    /// Create a driver account together with its profile in one transaction.
    pub async fn create_driver(
        &self,
        user: NewUser,
        profile: NewDriverProfile,
    ) -> Result<(DbUser, DbDriverProfile), TrackerError> {
        let now = Utc::now();
        let username = user.username.clone();
        let mut tx = self.pool().begin().await?;
        let res = sqlx::query(
            r#"
            INSERT INTO users (
                username, password_hash, full_name, email, phone, role,
                university_id, employee_id, approval_status, is_active,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.phone)
        .bind(Role::Driver)
        .bind(user.university_id)
        .bind(user.employee_id)
        .bind(ApprovalStatus::Approved)
        .bind(true)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(TrackerError::on_unique(format!(
            "Username \"{username}\" is already taken."
        )))?;
        let user_id = res.last_insert_rowid();

        sqlx::query(
            r#"INSERT INTO driver_profiles (
                user_id, license_number, license_expiry, emergency_contact, years_experience
              ) VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(profile.license_number)
        .bind(profile.license_expiry)
        .bind(profile.emergency_contact)
        .bind(profile.years_experience)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let user = self.get_user(user_id).await?;
        let profile = self.get_driver_profile(user_id).await?;
        Ok((user, profile))
    }

    pub async fn get_driver_profile(&self, user_id: i64) -> Result<DbDriverProfile, TrackerError> {
        sqlx::query_as::<_, DbDriverProfile>(
            r#"SELECT id, user_id, license_number, license_expiry, emergency_contact,
               years_experience, is_available
               FROM driver_profiles WHERE user_id = ?"#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or(TrackerError::NotFound("Driver profile"))
    }
}
