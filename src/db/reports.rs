use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;

use crate::db::models::{DbFeedback, DbRouteAnalytics, DbTripLog};
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{FeedbackCategory, ON_TIME_TOLERANCE_MINS};

const TRIP_LOG_COLUMNS: &str = "id, bus_id, route_id, driver_id, date, scheduled_departure, \
     actual_departure, scheduled_arrival, actual_arrival, passenger_count, is_completed, notes, \
     created_at";

const FEEDBACK_COLUMNS: &str = "id, user_id, route_id, bus_id, category, rating, comment, \
     is_anonymous, is_resolved, admin_response, created_at";

const ANALYTICS_COLUMNS: &str = "id, route_id, date, total_trips, on_time_trips, delayed_trips, \
     total_passengers, average_delay_mins, issues_count";

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub route_id: Option<i64>,
    pub bus_id: Option<i64>,
    pub category: FeedbackCategory,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTripLog {
    pub bus_id: i64,
    pub route_id: i64,
    pub driver_id: Option<i64>,
    pub date: NaiveDate,
    pub scheduled_departure: NaiveTime,
    pub actual_departure: Option<NaiveTime>,
    pub scheduled_arrival: NaiveTime,
    pub actual_arrival: Option<NaiveTime>,
    #[serde(default)]
    pub passenger_count: i64,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub notes: String,
}

/// Per-route totals over a date range.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RouteSummary {
    pub route_id: i64,
    pub route_name: String,
    pub total_trips: i64,
    pub on_time_trips: i64,
    pub delayed_trips: i64,
    pub total_passengers: i64,
    pub average_delay_mins: f64,
    pub issues_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub total_trips: i64,
    pub on_time_trips: i64,
    pub total_passengers: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryRating {
    pub category: FeedbackCategory,
    pub count: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub total: i64,
    pub average_rating: Option<f64>,
    pub by_category: Vec<CategoryRating>,
}

/// Aggregates of one route's trip logs for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TripStats {
    pub total_trips: i64,
    pub on_time_trips: i64,
    pub delayed_trips: i64,
    pub total_passengers: i64,
    pub average_delay_mins: f64,
}

impl TripStats {
    /// A trip is on time when it left at most `ON_TIME_TOLERANCE_MINS` late.
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a DbTripLog>) -> Self {
        let mut stats = TripStats::default();
        let mut delay_sum = 0;
        for log in logs {
            let delay = log.departure_delay_mins();
            stats.total_trips += 1;
            stats.total_passengers += log.passenger_count;
            delay_sum += delay;
            if delay <= ON_TIME_TOLERANCE_MINS {
                stats.on_time_trips += 1;
            } else {
                stats.delayed_trips += 1;
            }
        }
        if stats.total_trips > 0 {
            stats.average_delay_mins = delay_sum as f64 / stats.total_trips as f64;
        }
        stats
    }
}

impl Storage {
    pub async fn create_feedback(
        &self,
        user_id: i64,
        new: NewFeedback,
    ) -> Result<DbFeedback, TrackerError> {
        if !(1..=5).contains(&new.rating) {
            return Err(TrackerError::validation("Rating must be between 1 and 5."));
        }
        let res = sqlx::query(
            r#"INSERT INTO user_feedback (
                user_id, route_id, bus_id, category, rating, comment, is_anonymous, created_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(new.route_id)
        .bind(new.bus_id)
        .bind(new.category)
        .bind(new.rating)
        .bind(new.comment)
        .bind(new.is_anonymous)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        let row = sqlx::query_as::<_, DbFeedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM user_feedback WHERE id = ?"
        ))
        .bind(res.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_feedback_since(&self, from: NaiveDate) -> Result<Vec<DbFeedback>, TrackerError> {
        let rows = sqlx::query_as::<_, DbFeedback>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM user_feedback \
             WHERE substr(created_at, 1, 10) >= ? ORDER BY created_at DESC"
        ))
        .bind(from.to_string())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn feedback_summary(&self) -> Result<FeedbackSummary, TrackerError> {
        let by_category = sqlx::query_as::<_, CategoryRating>(
            "SELECT category, COUNT(*) AS count, AVG(rating) AS average_rating \
             FROM user_feedback GROUP BY category ORDER BY count DESC, category",
        )
        .fetch_all(self.pool())
        .await?;
        let (total, average_rating): (i64, Option<f64>) =
            sqlx::query_as("SELECT COUNT(*), AVG(rating) FROM user_feedback")
                .fetch_one(self.pool())
                .await?;
        Ok(FeedbackSummary {
            total,
            average_rating,
            by_category,
        })
    }

    pub async fn create_trip_log(&self, new: NewTripLog) -> Result<DbTripLog, TrackerError> {
        if new.passenger_count < 0 {
            return Err(TrackerError::validation("Passenger count cannot be negative."));
        }
        self.get_bus(new.bus_id).await?;
        self.get_route(new.route_id).await?;
        let res = sqlx::query(
            r#"INSERT INTO trip_logs (
                bus_id, route_id, driver_id, date, scheduled_departure, actual_departure,
                scheduled_arrival, actual_arrival, passenger_count, is_completed, notes, created_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new.bus_id)
        .bind(new.route_id)
        .bind(new.driver_id)
        .bind(new.date)
        .bind(new.scheduled_departure)
        .bind(new.actual_departure)
        .bind(new.scheduled_arrival)
        .bind(new.actual_arrival)
        .bind(new.passenger_count)
        .bind(new.is_completed)
        .bind(new.notes)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        let row = sqlx::query_as::<_, DbTripLog>(&format!(
            "SELECT {TRIP_LOG_COLUMNS} FROM trip_logs WHERE id = ?"
        ))
        .bind(res.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Trip logs with `from <= date <= to`.
    pub async fn list_trip_logs(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbTripLog>, TrackerError> {
        let rows = sqlx::query_as::<_, DbTripLog>(&format!(
            "SELECT {TRIP_LOG_COLUMNS} FROM trip_logs WHERE date >= ? AND date <= ? \
             ORDER BY date DESC, scheduled_departure DESC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn list_route_analytics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DbRouteAnalytics>, TrackerError> {
        let rows = sqlx::query_as::<_, DbRouteAnalytics>(&format!(
            "SELECT {ANALYTICS_COLUMNS} FROM route_analytics WHERE date >= ? AND date <= ? \
             ORDER BY date DESC, route_id"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn route_summaries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RouteSummary>, TrackerError> {
        let rows = sqlx::query_as::<_, RouteSummary>(
            r#"SELECT a.route_id, r.name AS route_name,
                 SUM(a.total_trips) AS total_trips,
                 SUM(a.on_time_trips) AS on_time_trips,
                 SUM(a.delayed_trips) AS delayed_trips,
                 SUM(a.total_passengers) AS total_passengers,
                 AVG(a.average_delay_mins) AS average_delay_mins,
                 SUM(a.issues_count) AS issues_count
               FROM route_analytics AS a JOIN routes AS r ON r.id = a.route_id
               WHERE a.date >= ? AND a.date <= ?
               GROUP BY a.route_id, r.name
               ORDER BY total_passengers DESC, a.route_id"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn daily_performance(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyPerformance>, TrackerError> {
        let rows = sqlx::query_as::<_, DailyPerformance>(
            r#"SELECT date,
                 SUM(total_trips) AS total_trips,
                 SUM(on_time_trips) AS on_time_trips,
                 SUM(total_passengers) AS total_passengers
               FROM route_analytics
               WHERE date >= ? AND date <= ?
               GROUP BY date ORDER BY date"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Rebuild `route_analytics` rows for `date` from that day's trip logs
    /// and issues. Routes without trip logs get no row.
    pub async fn recompute_analytics(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DbRouteAnalytics>, TrackerError> {
        let logs = self.list_trip_logs(date, date).await?;
        let mut by_route: BTreeMap<i64, Vec<&DbTripLog>> = BTreeMap::new();
        for log in &logs {
            by_route.entry(log.route_id).or_default().push(log);
        }

        let mut tx = self.pool().begin().await?;
        for (route_id, route_logs) in &by_route {
            let stats = TripStats::from_logs(route_logs.iter().copied());
            let (issues,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM issues WHERE route_id = ? AND substr(created_at, 1, 10) = ?",
            )
            .bind(route_id)
            .bind(date.to_string())
            .fetch_one(&mut *tx)
            .await?;
            sqlx::query(
                r#"INSERT INTO route_analytics (
                    route_id, date, total_trips, on_time_trips, delayed_trips, total_passengers,
                    average_delay_mins, issues_count
                  ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                  ON CONFLICT (route_id, date) DO UPDATE SET
                    total_trips = excluded.total_trips,
                    on_time_trips = excluded.on_time_trips,
                    delayed_trips = excluded.delayed_trips,
                    total_passengers = excluded.total_passengers,
                    average_delay_mins = excluded.average_delay_mins,
                    issues_count = excluded.issues_count"#,
            )
            .bind(route_id)
            .bind(date)
            .bind(stats.total_trips)
            .bind(stats.on_time_trips)
            .bind(stats.delayed_trips)
            .bind(stats.total_passengers)
            .bind(stats.average_delay_mins)
            .bind(issues)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!(%date, routes = by_route.len(), "route analytics recomputed");
        self.list_route_analytics(date, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(scheduled: &str, actual: Option<&str>, passengers: i64) -> DbTripLog {
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
            passenger_count: passengers,
            is_completed: true,
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn five_minutes_late_is_still_on_time() {
        let logs = vec![
            log("08:00", Some("08:05"), 10),
            log("09:00", Some("09:06"), 20),
            log("10:00", None, 5),
        ];
        let stats = TripStats::from_logs(&logs);
        assert_eq!(stats.total_trips, 3);
        assert_eq!(stats.on_time_trips, 2);
        assert_eq!(stats.delayed_trips, 1);
        assert_eq!(stats.total_passengers, 35);
        assert!((stats.average_delay_mins - 11.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_logs_yield_zeroes() {
        assert_eq!(TripStats::from_logs(&Vec::<DbTripLog>::new()), TripStats::default());
    }
}
