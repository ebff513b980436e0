use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{
    ApprovalStatus, Audience, BusType, DayOfWeek, FeedbackCategory, IssuePriority, IssueStatus,
    IssueType, NotificationPriority, Role, RouteType, ServiceDays, TripType,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub university_id: Option<String>,
    pub employee_id: Option<String>,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub fn can_login(&self) -> bool {
        self.is_active && self.approval_status.can_login()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbDriverProfile {
    pub id: i64,
    pub user_id: i64,
    pub license_number: String,
    pub license_expiry: Option<NaiveDate>,
    pub emergency_contact: Option<String>,
    pub years_experience: i64,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbRoute {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub route_type: RouteType,
    pub color: String,
    pub is_active: bool,
    pub is_published: bool,
    pub total_distance_km: Option<f64>,
    pub estimated_duration_mins: Option<i64>,
    pub service_days: ServiceDays,
    pub custom_days: Option<String>,
    pub origin_name: String,
    pub destination_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbStop {
    pub id: i64,
    pub route_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub stop_order: i64,
    pub scheduled_time: Option<NaiveTime>,
    pub average_wait_mins: i64,
    pub is_major_stop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTrip {
    pub id: i64,
    pub route_id: i64,
    pub name: String,
    pub trip_number: i64,
    pub trip_type: TripType,
    pub departure_time: NaiveTime,
    pub arrival_time: Option<NaiveTime>,
    pub is_active: bool,
    pub sort_order: i64,
}

/// Schedule row joined with its route name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbSchedule {
    pub id: i64,
    pub route_id: i64,
    pub route_name: String,
    pub bus_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub day_of_week: DayOfWeek,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub is_active: bool,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbBus {
    pub id: i64,
    pub bus_number: String,
    pub license_plate: String,
    pub bus_type: BusType,
    pub capacity: i64,
    pub model: String,
    pub year: Option<i64>,
    pub is_active: bool,
    pub current_route_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbAssignment {
    pub id: i64,
    pub bus_id: i64,
    pub driver_id: i64,
    pub route_id: i64,
    pub date: NaiveDate,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbBusLocation {
    pub id: i64,
    pub bus_id: i64,
    pub driver_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbIssue {
    pub id: i64,
    pub issue_type: IssueType,
    pub description: String,
    pub reported_by: i64,
    pub bus_id: Option<i64>,
    pub route_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assigned_to: Option<i64>,
    pub resolution_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbIssueComment {
    pub id: i64,
    pub issue_id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbNotification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub audience: Audience,
    pub target_route_id: Option<i64>,
    pub created_by: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One inbox entry: the per-user read state plus the notification it points to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbInboxEntry {
    pub notification_id: i64,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTripLog {
    pub id: i64,
    pub bus_id: i64,
    pub route_id: i64,
    pub driver_id: Option<i64>,
    pub date: NaiveDate,
    pub scheduled_departure: NaiveTime,
    pub actual_departure: Option<NaiveTime>,
    pub scheduled_arrival: NaiveTime,
    pub actual_arrival: Option<NaiveTime>,
    pub passenger_count: i64,
    pub is_completed: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl DbTripLog {
    /// Whole minutes the trip left late; early or unknown departures count as 0.
    pub fn departure_delay_mins(&self) -> i64 {
        match self.actual_departure {
            Some(actual) => (actual - self.scheduled_departure).num_minutes().max(0),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbFeedback {
    pub id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub bus_id: Option<i64>,
    pub category: FeedbackCategory,
    pub rating: i64,
    pub comment: String,
    pub is_anonymous: bool,
    pub is_resolved: bool,
    pub admin_response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbRouteAnalytics {
    pub id: i64,
    pub route_id: i64,
    pub date: NaiveDate,
    pub total_trips: i64,
    pub on_time_trips: i64,
    pub delayed_trips: i64,
    pub total_passengers: i64,
    pub average_delay_mins: f64,
    pub issues_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(scheduled: &str, actual: Option<&str>) -> DbTripLog {
        let t = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        DbTripLog {
            id: 1,
            bus_id: 1,
            route_id: 1,
            driver_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            scheduled_departure: t(scheduled),
            actual_departure: actual.map(t),
            scheduled_arrival: t("10:00"),
            actual_arrival: None,
            passenger_count: 0,
            is_completed: false,
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn departure_delay_never_negative() {
        assert_eq!(log("08:00", Some("08:07")).departure_delay_mins(), 7);
        assert_eq!(log("08:00", Some("07:50")).departure_delay_mins(), 0);
        assert_eq!(log("08:00", None).departure_delay_mins(), 0);
    }
}
