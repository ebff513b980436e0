use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::models::DbUser;
use crate::db::users::NewUser;
use crate::error::TrackerError;
use crate::middleware::auth::{
    CurrentUser, clear_session_cookie, encode_session, session_cookie,
};
use crate::router::AppState;
use crate::service::password::{hash_password, validate_password, verify_password};
use crate::types::{ApprovalStatus, Role};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
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

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: DbUser,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Letters, digits and `@ . + - _`, at most 150 characters.
pub(crate) fn validate_username(username: &str) -> Result<(), TrackerError> {
    let ok_chars = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if username.is_empty() || username.chars().count() > 150 || !ok_chars {
        return Err(TrackerError::validation(
            "Username must be 1-150 letters, digits or @.+-_ characters.",
        ));
    }
    Ok(())
}

/// POST /api/auth/register -> pending, inactive account for a regular role.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&req.password)?;
    if !req.role.is_self_registrable() {
        return Err(TrackerError::validation(
            "Only students, faculty and staff can register.",
        ));
    }
    if state.storage.find_user_by_username(&username).await?.is_some() {
        return Err(TrackerError::validation(format!(
            "Username \"{username}\" is already taken."
        )));
    }

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
            approval_status: ApprovalStatus::Pending,
            is_active: false,
        })
        .await?;
    info!(user_id = user.id, role = %user.role, "registration submitted");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user,
            message: "Registration submitted. An administrator will review it.",
        }),
    ))
}

/// POST /api/auth/login -> sets the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, TrackerError> {
    if state.login_limiter.check().is_err() {
        warn!("login rate limit exceeded");
        return Err(TrackerError::RateLimited);
    }
    let Some(user) = state
        .storage
        .find_user_by_username(req.username.trim())
        .await?
    else {
        return Err(TrackerError::InvalidCredentials);
    };
    if !verify_password(&req.password, &user.password_hash) {
        return Err(TrackerError::InvalidCredentials);
    }
    match user.approval_status {
        ApprovalStatus::Pending => {
            return Err(TrackerError::LoginRejected(
                "Your account is pending approval.",
            ));
        }
        ApprovalStatus::Rejected => {
            return Err(TrackerError::LoginRejected(
                "Your registration was rejected.",
            ));
        }
        ApprovalStatus::Approved if !user.is_active => {
            return Err(TrackerError::LoginRejected("Your account is disabled."));
        }
        ApprovalStatus::Approved => {}
    }

    let cookie = session_cookie(
        encode_session(user.id, Utc::now()),
        state.session.secure,
        state.session.hours,
    );
    info!(user_id = user.id, role = %user.role, "login");
    Ok((jar.add(cookie), Json(user)))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    (
        jar.remove(clear_session_cookie(state.session.secure)),
        StatusCode::NO_CONTENT,
    )
}

/// GET /api/auth/me
pub async fn me(user: CurrentUser) -> Json<DbUser> {
    Json(user.0)
}

#[cfg(test)]
mod tests {
    use super::validate_username;

    #[test]
    fn usernames() {
        assert!(validate_username("rahim.k+1@iubat").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }
}
