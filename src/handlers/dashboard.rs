use axum::{Json, extract::State};
use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::db::issues::IssueFilter;
use crate::db::models::{DbAssignment, DbBus, DbIssue, DbRoute, DbSchedule};
use crate::db::routes::ScheduleFilter;
use crate::error::TrackerError;
use crate::middleware::auth::CurrentUser;
use crate::router::AppState;
use crate::types::{DayOfWeek, Panel, Role};

const RECENT_ISSUES: i64 = 5;

/// Landing data for each panel. Tagged so the client can switch on `panel`.
#[derive(Debug, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum Dashboard {
    Admin {
        total_buses: i64,
        active_buses: i64,
        total_routes: i64,
        total_drivers: i64,
        open_issues: i64,
        pending_registrations: i64,
    },
    Authority {
        total_buses: i64,
        total_routes: i64,
        total_users: i64,
        total_drivers: i64,
    },
    Driver {
        assignment: Option<DbAssignment>,
        bus: Option<DbBus>,
        route: Option<DbRoute>,
        recent_issues: Vec<DbIssue>,
    },
    Rider {
        day: DayOfWeek,
        schedules: Vec<DbSchedule>,
    },
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Dashboard>, TrackerError> {
    let storage = &state.storage;
    let view = match user.role().panel() {
        Panel::Admin => Dashboard::Admin {
            total_buses: storage.count_buses(false).await?,
            active_buses: storage.count_buses(true).await?,
            total_routes: storage.count_routes().await?,
            total_drivers: storage.count_users_with_roles(&[Role::Driver]).await?,
            open_issues: storage.count_open_issues().await?,
            pending_registrations: storage.count_pending_users().await?,
        },
        Panel::Authority => Dashboard::Authority {
            total_buses: storage.count_buses(false).await?,
            total_routes: storage.count_routes().await?,
            total_users: storage.count_users_with_roles(&Role::REGULAR).await?,
            total_drivers: storage.count_users_with_roles(&[Role::Driver]).await?,
        },
        Panel::Driver => {
            let assignment = storage.active_assignment_for_driver(user.id()).await?;
            let (bus, route) = match &assignment {
                Some(a) => (
                    Some(storage.get_bus(a.bus_id).await?),
                    Some(storage.get_route(a.route_id).await?),
                ),
                None => (None, None),
            };
            let filter = IssueFilter {
                reported_by: Some(user.id()),
                limit: Some(RECENT_ISSUES),
                ..Default::default()
            };
            Dashboard::Driver {
                assignment,
                bus,
                route,
                recent_issues: storage.list_issues(&filter).await?,
            }
        }
        Panel::Rider => {
            let day = DayOfWeek::from(state.local_today(Utc::now()).weekday());
            let filter = ScheduleFilter {
                day: Some(day),
                route_id: None,
            };
            Dashboard::Rider {
                day,
                schedules: storage.list_schedules(&filter).await?,
            }
        }
    };
    Ok(Json(view))
}
