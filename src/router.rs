use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch, post},
};
use axum_extra::extract::cookie::Key;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::config::Config;
use crate::db::Storage;
use crate::error::TrackerError;
use crate::handlers::{
    accounts, assignments, buses, dashboard, issues, locations, notifications, reports, routes,
    users,
};
use crate::service::eta::EtaEstimator;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub secure: bool,
    pub hours: i64,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub key: Key,
    pub eta: EtaEstimator,
    /// Locations older than this are not live.
    pub active_window_secs: i64,
    pub session: SessionSettings,
    pub login_limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(storage: Storage, cfg: &Config) -> Result<Self, TrackerError> {
        cfg.validate()?;
        let key = match cfg.basic.cookie_secret.as_deref() {
            Some(secret) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(secret.trim())
                    .map_err(|e| TrackerError::Config(format!("cookie_secret is not base64: {e}")))?;
                Key::try_from(bytes.as_slice()).map_err(|_| {
                    TrackerError::Config("cookie_secret must decode to at least 64 bytes".into())
                })?
            }
            None => {
                warn!("no cookie_secret configured; sessions will not survive a restart");
                Key::generate()
            }
        };
        let offset = FixedOffset::east_opt(cfg.basic.utc_offset_minutes * 60).ok_or_else(|| {
            TrackerError::Config(format!(
                "utc_offset_minutes out of range: {}",
                cfg.basic.utc_offset_minutes
            ))
        })?;
        let per_minute = NonZeroU32::new(cfg.auth.login_per_minute).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            storage,
            key,
            eta: EtaEstimator::new(cfg.eta, offset),
            active_window_secs: cfg.eta.active_window_secs,
            session: SessionSettings {
                secure: !cfg.basic.insecure_cookie,
                hours: cfg.auth.session_hours,
            },
            login_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    /// Campus-local calendar day of `now`.
    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.eta.offset()).date_naive()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        // accounts
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
        .route("/auth/me", get(accounts::me))
        .route("/dashboard", get(dashboard::dashboard))
        // user administration
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/pending", get(users::list_pending))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/approve", post(users::approve))
        .route("/users/{id}/reject", post(users::reject))
        .route("/drivers", get(users::list_drivers).post(users::create_driver))
        // routes, stops, trips, schedules
        .route("/routes", get(routes::list_routes).post(routes::create_route))
        .route(
            "/routes/{id}",
            get(routes::get_route)
                .patch(routes::update_route)
                .delete(routes::delete_route),
        )
        .route(
            "/routes/{id}/stops",
            get(routes::list_stops).post(routes::create_stop),
        )
        .route(
            "/stops/{id}",
            patch(routes::update_stop).delete(routes::delete_stop),
        )
        .route(
            "/routes/{id}/trips",
            get(routes::list_trips).post(routes::create_trip),
        )
        .route("/trips/{id}", axum::routing::delete(routes::delete_trip))
        .route("/routes/{id}/eta", get(routes::route_eta))
        .route("/schedules", get(routes::list_schedules))
        .route("/schedules/today", get(routes::today_schedules))
        // fleet
        .route("/buses", get(buses::list_buses).post(buses::create_bus))
        .route(
            "/buses/{id}",
            get(buses::get_bus)
                .patch(buses::update_bus)
                .delete(buses::delete_bus),
        )
        .route("/buses/{id}/location", get(buses::bus_location))
        .route("/buses/{id}/eta/{stop_id}", get(buses::bus_eta))
        .route(
            "/buses/{id}/assignment/clear",
            post(assignments::clear_assignment),
        )
        .route(
            "/assignments",
            get(assignments::list_assignments).post(assignments::create_assignment),
        )
        .route("/assignments/mine", get(assignments::my_assignment))
        .route("/assignments/mine/start", post(assignments::start_shift))
        .route("/assignments/mine/end", post(assignments::end_shift))
        // live positions
        .route("/locations", post(locations::report_location))
        .route("/locations/active", get(locations::active_locations))
        .route("/locations/status", get(locations::simulation_status))
        .route("/locations/delay", post(locations::report_delay))
        // issues
        .route("/issues", get(issues::list_issues).post(issues::report_issue))
        .route(
            "/issues/{id}",
            get(issues::get_issue).patch(issues::update_issue),
        )
        .route("/issues/{id}/assign", post(issues::assign_issue))
        .route("/issues/{id}/resolve", post(issues::resolve_issue))
        .route(
            "/issues/{id}/comments",
            get(issues::list_comments).post(issues::add_comment),
        )
        // notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route("/notifications/unread", get(notifications::unread))
        .route("/notifications/inbox", get(notifications::inbox))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            patch(notifications::update_notification).delete(notifications::delete_notification),
        )
        .route("/notifications/{id}/read", post(notifications::mark_read))
        // reporting
        .route("/feedback", post(reports::submit_feedback))
        .route(
            "/trip-logs",
            get(reports::list_trip_logs).post(reports::create_trip_log),
        )
        .route("/reports/routes", get(reports::route_analytics))
        .route("/reports/performance", get(reports::performance))
        .route("/reports/feedback", get(reports::feedback_summary))
        .route("/reports/export", get(reports::export))
        .route(
            "/reports/analytics/recompute",
            post(reports::recompute_analytics),
        );

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
}
