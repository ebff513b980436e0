use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::types::IssueStatus;

#[derive(Debug, ThisError)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    LoginRejected(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot move issue from {from} to {to}")]
    InvalidTransition { from: IssueStatus, to: IssueStatus },

    #[error("Too many attempts; try again later")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Ractor error: {0}")]
    Actor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        TrackerError::Conflict(msg.into())
    }

    /// Map a unique-constraint violation to a user-facing conflict, pass
    /// every other database error through.
    pub fn on_unique(msg: impl Into<String>) -> impl FnOnce(SqlxError) -> Self {
        let msg = msg.into();
        move |e| {
            let unique = matches!(&e, SqlxError::Database(db) if db.is_unique_violation());
            if unique {
                TrackerError::Conflict(msg)
            } else {
                TrackerError::Database(e)
            }
        }
    }
}

impl From<argon2::password_hash::Error> for TrackerError {
    fn from(e: argon2::password_hash::Error) -> Self {
        TrackerError::PasswordHash(e.to_string())
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TrackerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            TrackerError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            TrackerError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            TrackerError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            TrackerError::LoginRejected(_) => (StatusCode::FORBIDDEN, "LOGIN_REJECTED"),
            TrackerError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            TrackerError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            TrackerError::InvalidTransition { .. } => {
                (StatusCode::BAD_REQUEST, "INVALID_TRANSITION")
            }
            TrackerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            TrackerError::Database(_)
            | TrackerError::PasswordHash(_)
            | TrackerError::Actor(_)
            | TrackerError::Io(_)
            | TrackerError::Config(_) => {
                error!(error = %self, "request failed with internal error");
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiErrorResponse { error: body }),
                )
                    .into_response();
            }
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
