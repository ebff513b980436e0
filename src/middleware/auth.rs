use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::Duration;

use crate::db::models::DbUser;
use crate::error::TrackerError;
use crate::router::AppState;
use crate::types::{Panel, Role};

pub const SESSION_COOKIE: &str = "bustrack_session";

/// Session payload: `<user id>:<issued at, unix seconds>`. The jar encrypts
/// and authenticates it, so it only needs to be parseable.
pub fn encode_session(user_id: i64, issued_at: DateTime<Utc>) -> String {
    format!("{user_id}:{}", issued_at.timestamp())
}

fn decode_session(value: &str) -> Option<(i64, i64)> {
    let (id, issued) = value.split_once(':')?;
    Some((id.parse().ok()?, issued.parse().ok()?))
}

pub fn session_cookie(value: String, secure: bool, hours: i64) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(hours))
        .build()
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// The authenticated account behind the request. Rejects with 401 when the
/// cookie is missing, expired, or points at an account that can no longer
/// log in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub DbUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = TrackerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.key.clone());
        let Some((user_id, issued)) = jar
            .get(SESSION_COOKIE)
            .and_then(|c| decode_session(c.value()))
        else {
            return Err(TrackerError::Unauthenticated);
        };
        if Utc::now().timestamp() - issued > state.session.hours * 3600 {
            return Err(TrackerError::Unauthenticated);
        }
        let user = match state.storage.get_user(user_id).await {
            Ok(user) => user,
            Err(TrackerError::NotFound(_)) => return Err(TrackerError::Unauthenticated),
            Err(e) => return Err(e),
        };
        if !user.can_login() {
            return Err(TrackerError::Unauthenticated);
        }
        Ok(CurrentUser(user))
    }
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn require_admin(&self) -> Result<(), TrackerError> {
        match self.role().panel() {
            Panel::Admin => Ok(()),
            Panel::Authority | Panel::Driver | Panel::Rider => Err(TrackerError::Forbidden),
        }
    }

    /// Admin or authority.
    pub fn require_management(&self) -> Result<(), TrackerError> {
        match self.role().panel() {
            Panel::Admin | Panel::Authority => Ok(()),
            Panel::Driver | Panel::Rider => Err(TrackerError::Forbidden),
        }
    }

    pub fn require_driver(&self) -> Result<(), TrackerError> {
        match self.role().panel() {
            Panel::Driver => Ok(()),
            Panel::Admin | Panel::Authority | Panel::Rider => Err(TrackerError::Forbidden),
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), TrackerError> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(TrackerError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_value_round_trips() {
        let issued = Utc::now();
        let value = encode_session(42, issued);
        assert_eq!(decode_session(&value), Some((42, issued.timestamp())));
    }

    #[test]
    fn malformed_session_values_are_ignored() {
        assert_eq!(decode_session(""), None);
        assert_eq!(decode_session("42"), None);
        assert_eq!(decode_session("abc:1"), None);
    }
}
