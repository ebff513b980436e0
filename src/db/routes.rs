use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::models::{DbRoute, DbSchedule, DbStop, DbTrip};
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{DayOfWeek, RouteType, ServiceDays, TripType};

const ROUTE_COLUMNS: &str = "id, name, description, route_type, color, is_active, is_published, \
     total_distance_km, estimated_duration_mins, service_days, custom_days, origin_name, \
     destination_name, created_at, updated_at";

const STOP_COLUMNS: &str = "id, route_id, name, latitude, longitude, stop_order, scheduled_time, \
     average_wait_mins, is_major_stop";

const TRIP_COLUMNS: &str = "id, route_id, name, trip_number, trip_type, departure_time, \
     arrival_time, is_active, sort_order";

const SCHEDULE_SELECT: &str = "SELECT s.id, s.route_id, r.name AS route_name, s.bus_id, \
     s.driver_id, s.day_of_week, s.departure_time, s.arrival_time, s.is_active, s.notes \
     FROM schedules s JOIN routes r ON r.id = s.route_id";

/// Route payload shared by create (all fields) and update (any subset).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub route_type: Option<RouteType>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
    pub is_published: Option<bool>,
    pub total_distance_km: Option<f64>,
    pub estimated_duration_mins: Option<i64>,
    pub service_days: Option<ServiceDays>,
    pub custom_days: Option<String>,
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopInput {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stop_order: Option<i64>,
    pub scheduled_time: Option<NaiveTime>,
    pub average_wait_mins: Option<i64>,
    pub is_major_stop: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub name: String,
    #[serde(default = "default_trip_number")]
    pub trip_number: i64,
    #[serde(default)]
    pub trip_type: TripType,
    pub departure_time: NaiveTime,
    pub arrival_time: Option<NaiveTime>,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_trip_number() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleFilter {
    pub day: Option<DayOfWeek>,
    pub route_id: Option<i64>,
}

impl Storage {
    pub async fn create_route(&self, input: RouteInput) -> Result<DbRoute, TrackerError> {
        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TrackerError::validation("Route name is required."))?;
        let now = Utc::now();
        let res = sqlx::query(
            r#"
            INSERT INTO routes (
                name, description, route_type, color, is_active, is_published,
                total_distance_km, estimated_duration_mins, service_days, custom_days,
                origin_name, destination_name, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(input.description.unwrap_or_default())
        .bind(input.route_type.unwrap_or_default())
        .bind(input.color.unwrap_or_else(|| "#ffc107".to_string()))
        .bind(input.is_active.unwrap_or(true))
        .bind(input.is_published.unwrap_or(false))
        .bind(input.total_distance_km)
        .bind(input.estimated_duration_mins)
        .bind(input.service_days.unwrap_or_default())
        .bind(input.custom_days)
        .bind(input.origin_name.unwrap_or_default())
        .bind(input.destination_name.unwrap_or_default())
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        self.get_route(res.last_insert_rowid()).await
    }

    pub async fn get_route(&self, id: i64) -> Result<DbRoute, TrackerError> {
        sqlx::query_as::<_, DbRoute>(&format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(TrackerError::NotFound("Route"))
    }

    /// Active routes; `published_only` hides drafts from riders.
    pub async fn list_routes(&self, published_only: bool) -> Result<Vec<DbRoute>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE is_active = 1"
        ));
        if published_only {
            qb.push(" AND is_published = 1");
        }
        qb.push(" ORDER BY name");
        Ok(qb.build_query_as::<DbRoute>().fetch_all(self.pool()).await?)
    }

    pub async fn update_route(&self, id: i64, input: RouteInput) -> Result<DbRoute, TrackerError> {
        let cur = self.get_route(id).await?;
        sqlx::query(
            r#"UPDATE routes SET
                name = ?, description = ?, route_type = ?, color = ?, is_active = ?,
                is_published = ?, total_distance_km = ?, estimated_duration_mins = ?,
                service_days = ?, custom_days = ?, origin_name = ?, destination_name = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(input.name.unwrap_or(cur.name))
        .bind(input.description.unwrap_or(cur.description))
        .bind(input.route_type.unwrap_or(cur.route_type))
        .bind(input.color.unwrap_or(cur.color))
        .bind(input.is_active.unwrap_or(cur.is_active))
        .bind(input.is_published.unwrap_or(cur.is_published))
        .bind(input.total_distance_km.or(cur.total_distance_km))
        .bind(input.estimated_duration_mins.or(cur.estimated_duration_mins))
        .bind(input.service_days.unwrap_or(cur.service_days))
        .bind(input.custom_days.or(cur.custom_days))
        .bind(input.origin_name.unwrap_or(cur.origin_name))
        .bind(input.destination_name.unwrap_or(cur.destination_name))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        self.get_route(id).await
    }

    pub async fn delete_route(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM routes WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Route"));
        }
        Ok(())
    }

    pub async fn count_routes(&self) -> Result<i64, TrackerError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM routes")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    // stops

    pub async fn list_stops(&self, route_id: i64) -> Result<Vec<DbStop>, TrackerError> {
        let rows = sqlx::query_as::<_, DbStop>(&format!(
            "SELECT {STOP_COLUMNS} FROM stops WHERE route_id = ? ORDER BY stop_order, id"
        ))
        .bind(route_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_stop(&self, id: i64) -> Result<DbStop, TrackerError> {
        sqlx::query_as::<_, DbStop>(&format!("SELECT {STOP_COLUMNS} FROM stops WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(TrackerError::NotFound("Stop"))
    }

    pub async fn create_stop(&self, route_id: i64, input: StopInput) -> Result<DbStop, TrackerError> {
        self.get_route(route_id).await?;
        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TrackerError::validation("Stop name is required."))?;
        let (Some(latitude), Some(longitude)) = (input.latitude, input.longitude) else {
            return Err(TrackerError::validation("Stop latitude and longitude are required."));
        };
        validate_coordinates(latitude, longitude)?;
        let res = sqlx::query(
            r#"INSERT INTO stops (
                route_id, name, latitude, longitude, stop_order, scheduled_time,
                average_wait_mins, is_major_stop
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(route_id)
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .bind(input.stop_order.unwrap_or(0))
        .bind(input.scheduled_time)
        .bind(input.average_wait_mins.unwrap_or(2))
        .bind(input.is_major_stop.unwrap_or(false))
        .execute(self.pool())
        .await
        .map_err(TrackerError::on_unique("A stop with this order already exists on the route."))?;
        self.get_stop(res.last_insert_rowid()).await
    }

    pub async fn update_stop(&self, id: i64, input: StopInput) -> Result<DbStop, TrackerError> {
        let cur = self.get_stop(id).await?;
        let latitude = input.latitude.unwrap_or(cur.latitude);
        let longitude = input.longitude.unwrap_or(cur.longitude);
        validate_coordinates(latitude, longitude)?;
        sqlx::query(
            r#"UPDATE stops SET
                name = ?, latitude = ?, longitude = ?, stop_order = ?, scheduled_time = ?,
                average_wait_mins = ?, is_major_stop = ?
              WHERE id = ?"#,
        )
        .bind(input.name.unwrap_or(cur.name))
        .bind(latitude)
        .bind(longitude)
        .bind(input.stop_order.unwrap_or(cur.stop_order))
        .bind(input.scheduled_time.or(cur.scheduled_time))
        .bind(input.average_wait_mins.unwrap_or(cur.average_wait_mins))
        .bind(input.is_major_stop.unwrap_or(cur.is_major_stop))
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(TrackerError::on_unique("A stop with this order already exists on the route."))?;
        self.get_stop(id).await
    }

    pub async fn delete_stop(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM stops WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Stop"));
        }
        Ok(())
    }

    // trips

    pub async fn list_trips(&self, route_id: i64) -> Result<Vec<DbTrip>, TrackerError> {
        let rows = sqlx::query_as::<_, DbTrip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE route_id = ? ORDER BY sort_order, departure_time"
        ))
        .bind(route_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn create_trip(&self, route_id: i64, trip: NewTrip) -> Result<DbTrip, TrackerError> {
        self.get_route(route_id).await?;
        if trip.name.trim().is_empty() {
            return Err(TrackerError::validation("Trip name is required."));
        }
        let res = sqlx::query(
            r#"INSERT INTO trips (
                route_id, name, trip_number, trip_type, departure_time, arrival_time, sort_order
              ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(route_id)
        .bind(trip.name)
        .bind(trip.trip_number)
        .bind(trip.trip_type)
        .bind(trip.departure_time)
        .bind(trip.arrival_time)
        .bind(trip.sort_order)
        .execute(self.pool())
        .await?;
        let trip = sqlx::query_as::<_, DbTrip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"
        ))
        .bind(res.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(trip)
    }

    pub async fn delete_trip(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Trip"));
        }
        Ok(())
    }

    // schedules

    /// Active schedules of routes that currently have an active assignment.
    pub async fn list_schedules(
        &self,
        filter: &ScheduleFilter,
    ) -> Result<Vec<DbSchedule>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SCHEDULE_SELECT);
        qb.push(
            " WHERE s.is_active = 1 AND s.route_id IN \
             (SELECT route_id FROM bus_assignments WHERE is_active = 1)",
        );
        if let Some(day) = filter.day {
            qb.push(" AND s.day_of_week = ").push_bind(day);
        }
        if let Some(route_id) = filter.route_id {
            qb.push(" AND s.route_id = ").push_bind(route_id);
        }
        qb.push(" ORDER BY r.name, s.departure_time");
        Ok(qb.build_query_as::<DbSchedule>().fetch_all(self.pool()).await?)
    }

    pub async fn list_schedules_for_bus(&self, bus_id: i64) -> Result<Vec<DbSchedule>, TrackerError> {
        let rows = sqlx::query_as::<_, DbSchedule>(&format!(
            "{SCHEDULE_SELECT} WHERE s.bus_id = ? ORDER BY s.day_of_week, s.departure_time"
        ))
        .bind(bus_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

pub(crate) fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), TrackerError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(TrackerError::validation("Coordinates are out of range."));
    }
    Ok(())
}
