use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::models::DbBusLocation;
use crate::db::routes::validate_coordinates;
use crate::db::sqlite::Storage;
use crate::error::TrackerError;

const LOCATION_COLUMNS: &str = "id, bus_id, driver_id, latitude, longitude, speed_kmh, heading, \
     recorded_at, is_active, is_simulated";

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub bus_id: i64,
    pub driver_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
    pub is_simulated: bool,
}

/// Counts of live (recent, active) location rows split by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationStatus {
    pub real_buses: i64,
    pub simulated_buses: i64,
    pub simulation_mode: bool,
}

impl Storage {
    pub async fn insert_location(&self, loc: NewLocation) -> Result<DbBusLocation, TrackerError> {
        validate_coordinates(loc.latitude, loc.longitude)?;
        if loc.speed_kmh.is_some_and(|s| s < 0.0 || !s.is_finite()) {
            return Err(TrackerError::validation("Speed must be a non-negative number."));
        }
        let res = sqlx::query(
            r#"INSERT INTO bus_locations (
                bus_id, driver_id, latitude, longitude, speed_kmh, heading,
                recorded_at, is_active, is_simulated
              ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(loc.bus_id)
        .bind(loc.driver_id)
        .bind(loc.latitude)
        .bind(loc.longitude)
        .bind(loc.speed_kmh)
        .bind(loc.heading)
        .bind(Utc::now())
        .bind(loc.is_simulated)
        .execute(self.pool())
        .await?;
        let row = sqlx::query_as::<_, DbBusLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM bus_locations WHERE id = ?"
        ))
        .bind(res.last_insert_rowid())
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Most recent row for the bus regardless of age. The ETA estimator works
    /// from this.
    pub async fn latest_location(
        &self,
        bus_id: i64,
    ) -> Result<Option<DbBusLocation>, TrackerError> {
        let row = sqlx::query_as::<_, DbBusLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM bus_locations WHERE bus_id = ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        ))
        .bind(bus_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Most recent active row for the bus recorded within `window_secs`.
    pub async fn live_location(
        &self,
        bus_id: i64,
        window_secs: i64,
    ) -> Result<Option<DbBusLocation>, TrackerError> {
        let row = sqlx::query_as::<_, DbBusLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM bus_locations \
             WHERE bus_id = ? AND is_active = 1 AND recorded_at >= ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        ))
        .bind(bus_id)
        .bind(since(window_secs))
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Latest live row per bus, one entry per bus.
    pub async fn active_bus_locations(
        &self,
        window_secs: i64,
    ) -> Result<Vec<DbBusLocation>, TrackerError> {
        let rows = sqlx::query_as::<_, DbBusLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM bus_locations AS l \
             WHERE l.is_active = 1 AND l.recorded_at >= ? \
               AND l.id = ( \
                 SELECT l2.id FROM bus_locations AS l2 \
                 WHERE l2.bus_id = l.bus_id AND l2.is_active = 1 \
                 ORDER BY l2.recorded_at DESC, l2.id DESC LIMIT 1 \
               ) \
             ORDER BY l.bus_id"
        ))
        .bind(since(window_secs))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn recent_locations(
        &self,
        bus_id: i64,
        limit: i64,
    ) -> Result<Vec<DbBusLocation>, TrackerError> {
        let rows = sqlx::query_as::<_, DbBusLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM bus_locations WHERE bus_id = ? \
             ORDER BY recorded_at DESC, id DESC LIMIT ?"
        ))
        .bind(bus_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// True when some driver reported a real position within the window.
    pub async fn has_recent_real_location(&self, window_secs: i64) -> Result<bool, TrackerError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bus_locations \
             WHERE is_simulated = 0 AND is_active = 1 AND recorded_at >= ?",
        )
        .bind(since(window_secs))
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    /// Mark every active simulated row inactive; returns how many changed.
    pub async fn deactivate_simulated_locations(&self) -> Result<u64, TrackerError> {
        let res = sqlx::query(
            "UPDATE bus_locations SET is_active = 0 WHERE is_simulated = 1 AND is_active = 1",
        )
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn simulation_status(&self, window_secs: i64) -> Result<SimulationStatus, TrackerError> {
        let (real, simulated): (i64, i64) = sqlx::query_as(
            "SELECT \
               COUNT(DISTINCT CASE WHEN is_simulated = 0 THEN bus_id END), \
               COUNT(DISTINCT CASE WHEN is_simulated = 1 THEN bus_id END) \
             FROM bus_locations WHERE is_active = 1 AND recorded_at >= ?",
        )
        .bind(since(window_secs))
        .fetch_one(self.pool())
        .await?;
        Ok(SimulationStatus {
            real_buses: real,
            simulated_buses: simulated,
            simulation_mode: real == 0,
        })
    }
}

fn since(window_secs: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(window_secs)
}
