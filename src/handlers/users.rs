use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{DbDriverProfile, DbUser};
use crate::db::users::{NewDriverProfile, NewUser, UserFilter, UserPatch};
use crate::error::TrackerError;
use crate::handlers::accounts::validate_username;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::service::password::{hash_password, validate_password};
use crate::types::{ApprovalStatus, Role};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub university_id: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDriverRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub employee_id: Option<String>,
    pub license_number: String,
    pub license_expiry: Option<NaiveDate>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub years_experience: i64,
}

#[derive(Debug, Serialize)]
pub struct DriverView {
    #[serde(flatten)]
    pub user: DbUser,
    pub profile: Option<DbDriverProfile>,
}

fn reject_admin_role(role: Role) -> Result<(), TrackerError> {
    match role {
        Role::Admin => Err(TrackerError::validation(
            "Administrator accounts cannot be created or granted here.",
        )),
        Role::Student | Role::Faculty | Role::Staff | Role::Driver | Role::Authority => Ok(()),
    }
}

/// GET /api/users (admin, authority)
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<DbUser>>, TrackerError> {
    user.require_management()?;
    let filter = UserFilter {
        role: q.role,
        is_active: q.is_active,
    };
    Ok(Json(state.storage.list_users(&filter).await?))
}

/// POST /api/users -> approved, active account of any non-admin role.
pub async fn create_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&req.password)?;
    reject_admin_role(req.role)?;
    let user = state
        .storage
        .create_user(NewUser {
            username,
            password_hash: hash_password(&req.password)?,
            full_name: req.full_name,
            email: req.email,
            phone: req.phone,
            role: req.role,
            university_id: req.university_id,
            employee_id: req.employee_id,
            approval_status: ApprovalStatus::Approved,
            is_active: true,
        })
        .await?;
    info!(user_id = user.id, role = %user.role, by = admin.id(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbUser>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.get_user(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<DbUser>, TrackerError> {
    admin.require_admin()?;
    let target = state.storage.get_user(id).await?;
    if let Some(role) = req.role
        && role != target.role
    {
        reject_admin_role(role)?;
    }
    if target.id == admin.id() && req.is_active == Some(false) {
        return Err(TrackerError::validation("You cannot deactivate your own account."));
    }
    let password_hash = match req.password.as_deref() {
        Some(plain) => {
            validate_password(plain)?;
            Some(hash_password(plain)?)
        }
        None => None,
    };
    let patch = UserPatch {
        full_name: req.full_name,
        email: req.email,
        phone: req.phone,
        role: req.role,
        is_active: req.is_active,
        password_hash,
    };
    Ok(Json(state.storage.update_user(id, patch).await?))
}

/// DELETE /api/users/{id} -> never an administrator, never yourself.
pub async fn delete_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, TrackerError> {
    admin.require_admin()?;
    if id == admin.id() {
        return Err(TrackerError::validation("You cannot delete your own account."));
    }
    let target = state.storage.get_user(id).await?;
    if target.role == Role::Admin {
        return Err(TrackerError::validation(
            "Administrator accounts cannot be deleted.",
        ));
    }
    state.storage.delete_user(id).await?;
    info!(user_id = id, by = admin.id(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_pending(
    State(state): State<AppState>,
    admin: CurrentUser,
) -> Result<Json<Vec<DbUser>>, TrackerError> {
    admin.require_admin()?;
    Ok(Json(state.storage.list_pending_users().await?))
}

pub async fn approve(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbUser>, TrackerError> {
    admin.require_admin()?;
    let user = state
        .storage
        .decide_registration(id, admin.id(), true, None)
        .await?;
    info!(user_id = id, by = admin.id(), "registration approved");
    Ok(Json(user))
}

pub async fn reject(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(id): Path<i64>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<DbUser>, TrackerError> {
    admin.require_admin()?;
    let reason = body
        .and_then(|Json(b)| b.reason)
        .filter(|r| !r.trim().is_empty());
    let user = state
        .storage
        .decide_registration(id, admin.id(), false, reason)
        .await?;
    info!(user_id = id, by = admin.id(), "registration rejected");
    Ok(Json(user))
}

pub async fn list_drivers(
    State(state): State<AppState>,
    admin: CurrentUser,
) -> Result<Json<Vec<DriverView>>, TrackerError> {
    admin.require_admin()?;
    let filter = UserFilter {
        role: Some(Role::Driver),
        is_active: None,
    };
    let mut drivers = Vec::new();
    for user in state.storage.list_users(&filter).await? {
        let profile = match state.storage.get_driver_profile(user.id).await {
            Ok(p) => Some(p),
            Err(TrackerError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        drivers.push(DriverView { user, profile });
    }
    Ok(Json(drivers))
}

pub async fn create_driver(
    State(state): State<AppState>,
    admin: CurrentUser,
    Json(req): Json<CreateDriverRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    admin.require_admin()?;
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&req.password)?;
    if req.license_number.trim().is_empty() {
        return Err(TrackerError::validation("License number is required."));
    }
    if req.years_experience < 0 {
        return Err(TrackerError::validation("Years of experience cannot be negative."));
    }
    let (user, profile) = state
        .storage
        .create_driver(
            NewUser {
                username,
                password_hash: hash_password(&req.password)?,
                full_name: req.full_name,
                email: req.email,
                phone: req.phone,
                role: Role::Driver,
                university_id: None,
                employee_id: req.employee_id,
                approval_status: ApprovalStatus::Approved,
                is_active: true,
            },
            NewDriverProfile {
                license_number: req.license_number,
                license_expiry: req.license_expiry,
                emergency_contact: req.emergency_contact,
                years_experience: req.years_experience,
            },
        )
        .await?;
    info!(user_id = user.id, by = admin.id(), "driver created");
    Ok((
        StatusCode::CREATED,
        Json(DriverView {
            user,
            profile: Some(profile),
        }),
    ))
}
