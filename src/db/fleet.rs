use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::info;

use crate::db::models::{DbAssignment, DbBus, DbRoute, DbStop, DbTrip};
use crate::db::sqlite::Storage;
use crate::error::TrackerError;
use crate::types::{BusType, DayOfWeek, Role};

const BUS_COLUMNS: &str = "id, bus_number, license_plate, bus_type, capacity, model, year, \
     is_active, current_route_id, created_at, updated_at";

const ASSIGNMENT_COLUMNS: &str = "id, bus_id, driver_id, route_id, date, shift_start, shift_end, \
     is_active, started_at, ended_at, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusInput {
    pub bus_number: Option<String>,
    pub license_plate: Option<String>,
    pub bus_type: Option<BusType>,
    pub capacity: Option<i64>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub bus_id: i64,
    pub driver_id: i64,
    pub route_id: i64,
    pub date: NaiveDate,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
}

/// Departure/arrival pair a schedule row is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub departure: NaiveTime,
    pub arrival: NaiveTime,
}

/// Slots for a route: one per active trip, or the first and last stop
/// times when the route has no trips. Empty when neither yields a time.
pub fn schedule_slots(trips: &[DbTrip], stops: &[DbStop]) -> Vec<ScheduleSlot> {
    let active: Vec<&DbTrip> = trips.iter().filter(|t| t.is_active).collect();
    if !active.is_empty() {
        return active
            .into_iter()
            .map(|t| ScheduleSlot {
                departure: t.departure_time,
                arrival: t.arrival_time.unwrap_or(t.departure_time),
            })
            .collect();
    }
    let Some(first) = stops.first().and_then(|s| s.scheduled_time) else {
        return Vec::new();
    };
    let last = stops.last().and_then(|s| s.scheduled_time).unwrap_or(first);
    vec![ScheduleSlot {
        departure: first,
        arrival: last,
    }]
}

impl Storage {
    pub async fn create_bus(&self, input: BusInput) -> Result<DbBus, TrackerError> {
        let bus_number = input
            .bus_number
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TrackerError::validation("Bus number is required."))?;
        let license_plate = input
            .license_plate
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TrackerError::validation("License plate is required."))?;
        let capacity = input.capacity.unwrap_or(50);
        if capacity <= 0 {
            return Err(TrackerError::validation("Capacity must be positive."));
        }
        let now = Utc::now();
        let res = sqlx::query(
            r#"INSERT INTO buses (
                bus_number, license_plate, bus_type, capacity, model, year, is_active,
                created_at, updated_at
              ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&bus_number)
        .bind(license_plate)
        .bind(input.bus_type.unwrap_or_default())
        .bind(capacity)
        .bind(input.model.unwrap_or_default())
        .bind(input.year)
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(TrackerError::on_unique(format!(
            "Bus number \"{bus_number}\" already exists."
        )))?;
        self.get_bus(res.last_insert_rowid()).await
    }

    pub async fn get_bus(&self, id: i64) -> Result<DbBus, TrackerError> {
        sqlx::query_as::<_, DbBus>(&format!("SELECT {BUS_COLUMNS} FROM buses WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(TrackerError::NotFound("Bus"))
    }

    pub async fn list_buses(&self, is_active: Option<bool>) -> Result<Vec<DbBus>, TrackerError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BUS_COLUMNS} FROM buses WHERE 1 = 1"));
        if let Some(active) = is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        qb.push(" ORDER BY bus_number");
        Ok(qb.build_query_as::<DbBus>().fetch_all(self.pool()).await?)
    }

    pub async fn update_bus(&self, id: i64, input: BusInput) -> Result<DbBus, TrackerError> {
        let cur = self.get_bus(id).await?;
        let bus_number = input.bus_number.unwrap_or(cur.bus_number);
        sqlx::query(
            r#"UPDATE buses SET
                bus_number = ?, license_plate = ?, bus_type = ?, capacity = ?, model = ?,
                year = ?, is_active = ?, updated_at = ?
              WHERE id = ?"#,
        )
        .bind(&bus_number)
        .bind(input.license_plate.unwrap_or(cur.license_plate))
        .bind(input.bus_type.unwrap_or(cur.bus_type))
        .bind(input.capacity.unwrap_or(cur.capacity))
        .bind(input.model.unwrap_or(cur.model))
        .bind(input.year.or(cur.year))
        .bind(input.is_active.unwrap_or(cur.is_active))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(TrackerError::on_unique(format!(
            "Bus number \"{bus_number}\" already exists."
        )))?;
        self.get_bus(id).await
    }

    pub async fn delete_bus(&self, id: i64) -> Result<(), TrackerError> {
        let res = sqlx::query("DELETE FROM buses WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(TrackerError::NotFound("Bus"));
        }
        Ok(())
    }

    pub async fn count_buses(&self, active_only: bool) -> Result<i64, TrackerError> {
        let sql = if active_only {
            "SELECT COUNT(*) FROM buses WHERE is_active = 1"
        } else {
            "SELECT COUNT(*) FROM buses"
        };
        let (count,): (i64,) = sqlx::query_as(sql).fetch_one(self.pool()).await?;
        Ok(count)
    }

    // assignments

    pub async fn list_assignments(&self) -> Result<Vec<DbAssignment>, TrackerError> {
        let rows = sqlx::query_as::<_, DbAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM bus_assignments ORDER BY date DESC, shift_start DESC"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn active_assignment_for_driver(
        &self,
        driver_id: i64,
    ) -> Result<Option<DbAssignment>, TrackerError> {
        self.active_assignment_by("driver_id", driver_id).await
    }

    pub async fn active_assignment_for_bus(
        &self,
        bus_id: i64,
    ) -> Result<Option<DbAssignment>, TrackerError> {
        self.active_assignment_by("bus_id", bus_id).await
    }

    pub async fn active_assignment_for_route(
        &self,
        route_id: i64,
    ) -> Result<Option<DbAssignment>, TrackerError> {
        self.active_assignment_by("route_id", route_id).await
    }

    async fn active_assignment_by(
        &self,
        column: &'static str,
        id: i64,
    ) -> Result<Option<DbAssignment>, TrackerError> {
        let mut conn = self.pool().acquire().await?;
        active_assignment_on(&mut conn, column, id).await
    }

    /// Create an assignment with check-and-set semantics: inside one
    /// transaction, refuse when the driver, bus or route already holds an
    /// active assignment, then insert, point the bus at the route and
    /// regenerate the bus's schedules on that route.
    pub async fn create_assignment(&self, new: NewAssignment) -> Result<DbAssignment, TrackerError> {
        if new.shift_end <= new.shift_start {
            return Err(TrackerError::validation("Shift end must be after shift start."));
        }
        let driver = self.get_user(new.driver_id).await?;
        if driver.role != Role::Driver {
            return Err(TrackerError::validation("Assignments need a user with the driver role."));
        }
        let bus = self.get_bus(new.bus_id).await?;
        let route = self.get_route(new.route_id).await?;
        let trips = self.list_trips(route.id).await?;
        let stops = self.list_stops(route.id).await?;

        let mut tx = self.pool().begin().await?;

        if active_assignment_on(&mut tx, "driver_id", driver.id).await?.is_some() {
            return Err(TrackerError::conflict(format!(
                "Driver {} already has an active assignment.",
                driver.username
            )));
        }
        if active_assignment_on(&mut tx, "bus_id", bus.id).await?.is_some() {
            return Err(TrackerError::conflict(format!(
                "Bus {} already has an active assignment.",
                bus.bus_number
            )));
        }
        if active_assignment_on(&mut tx, "route_id", route.id).await?.is_some() {
            return Err(TrackerError::conflict(format!(
                "Route \"{}\" already has an active assignment.",
                route.name
            )));
        }

        let now = Utc::now();
        let res = sqlx::query(
            r#"INSERT INTO bus_assignments (
                bus_id, driver_id, route_id, date, shift_start, shift_end, is_active, created_at
              ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(bus.id)
        .bind(driver.id)
        .bind(route.id)
        .bind(new.date)
        .bind(new.shift_start)
        .bind(new.shift_end)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(TrackerError::on_unique(
            "An overlapping active assignment already exists.",
        ))?;
        let assignment_id = res.last_insert_rowid();

        sqlx::query("UPDATE buses SET current_route_id = ?, updated_at = ? WHERE id = ?")
            .bind(route.id)
            .bind(now)
            .bind(bus.id)
            .execute(&mut *tx)
            .await?;

        let generated =
            regenerate_schedules(&mut tx, &route, bus.id, driver.id, &schedule_slots(&trips, &stops))
                .await?;

        tx.commit().await?;
        info!(
            assignment_id,
            bus = %bus.bus_number,
            route = %route.name,
            driver = %driver.username,
            schedules = generated,
            "assignment created"
        );
        self.get_assignment(assignment_id).await
    }

    pub async fn get_assignment(&self, id: i64) -> Result<DbAssignment, TrackerError> {
        sqlx::query_as::<_, DbAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM bus_assignments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or(TrackerError::NotFound("Assignment"))
    }

    /// Deactivate the bus's active assignment, detach the bus from its route
    /// and switch off the schedules generated for it.
    pub async fn clear_bus_assignment(&self, bus_id: i64) -> Result<DbAssignment, TrackerError> {
        let bus = self.get_bus(bus_id).await?;
        let mut tx = self.pool().begin().await?;
        let Some(active) = active_assignment_on(&mut tx, "bus_id", bus.id).await? else {
            return Err(TrackerError::NotFound("Active assignment"));
        };
        let now = Utc::now();
        sqlx::query("UPDATE bus_assignments SET is_active = 0, ended_at = COALESCE(ended_at, ?) WHERE id = ?")
            .bind(now)
            .bind(active.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE buses SET current_route_id = NULL, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(bus.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE schedules SET is_active = 0 WHERE bus_id = ? AND driver_id = ? AND is_active = 1",
        )
        .bind(bus.id)
        .bind(active.driver_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        info!(bus = %bus.bus_number, assignment_id = active.id, "assignment cleared");
        self.get_assignment(active.id).await
    }

    /// Stamp the start or end of the driver's shift on their active assignment.
    pub async fn mark_shift(&self, driver_id: i64, start: bool) -> Result<DbAssignment, TrackerError> {
        let active = self
            .active_assignment_for_driver(driver_id)
            .await?
            .ok_or(TrackerError::NotFound("Active assignment"))?;
        let sql = if start {
            "UPDATE bus_assignments SET started_at = ?, ended_at = NULL WHERE id = ?"
        } else {
            if active.started_at.is_none() {
                return Err(TrackerError::validation("The shift has not been started."));
            }
            "UPDATE bus_assignments SET ended_at = ? WHERE id = ?"
        };
        sqlx::query(sql)
            .bind(Utc::now())
            .bind(active.id)
            .execute(self.pool())
            .await?;
        self.get_assignment(active.id).await
    }
}

async fn active_assignment_on(
    conn: &mut SqliteConnection,
    column: &'static str,
    id: i64,
) -> Result<Option<DbAssignment>, TrackerError> {
    let row = sqlx::query_as::<_, DbAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM bus_assignments WHERE {column} = ? AND is_active = 1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

async fn regenerate_schedules(
    conn: &mut SqliteConnection,
    route: &DbRoute,
    bus_id: i64,
    driver_id: i64,
    slots: &[ScheduleSlot],
) -> Result<usize, TrackerError> {
    sqlx::query("DELETE FROM schedules WHERE route_id = ? AND bus_id = ?")
        .bind(route.id)
        .bind(bus_id)
        .execute(&mut *conn)
        .await?;

    let days: Vec<DayOfWeek> = route.service_days.days(route.custom_days.as_deref());
    let now = Utc::now();
    let mut created = 0;
    for slot in slots {
        for day in &days {
            sqlx::query(
                r#"INSERT INTO schedules (
                    route_id, bus_id, driver_id, day_of_week, departure_time, arrival_time,
                    is_active, created_at
                  ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
            )
            .bind(route.id)
            .bind(bus_id)
            .bind(driver_id)
            .bind(*day)
            .bind(slot.departure)
            .bind(slot.arrival)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            created += 1;
        }
    }
    Ok(created)
}
