//! Arrival-time estimation from a bus's last reported position.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::EtaConfig;
use crate::db::models::{DbBusLocation, DbStop};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Estimates beyond a week are not reported.
pub const MAX_TRAVEL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Whole minutes to cover `distance_km` at `speed_kmh`, padded by `buffer`.
/// Truncates toward zero. `None` when the result is not finite or exceeds
/// [`MAX_TRAVEL_MINUTES`].
pub fn travel_minutes(distance_km: f64, speed_kmh: f64, buffer: f64) -> Option<i64> {
    let minutes = (distance_km / speed_kmh) * buffer * 60.0;
    if !minutes.is_finite() || minutes > MAX_TRAVEL_MINUTES as f64 {
        return None;
    }
    Some((minutes as i64).max(0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eta {
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub minutes: i64,
    pub arrives_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub is_delayed: bool,
    pub delay_minutes: i64,
    pub location_recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EtaOutcome {
    Available(Eta),
    /// The bus has never reported a position, or its reported speed puts
    /// the arrival out of range.
    Unavailable,
}

impl EtaOutcome {
    pub fn minutes(&self) -> Option<i64> {
        match self {
            EtaOutcome::Available(eta) => Some(eta.minutes),
            EtaOutcome::Unavailable => None,
        }
    }
}

/// Estimator parameters. Scheduled stop times are wall-clock times at
/// `offset`.
#[derive(Debug, Clone, Copy)]
pub struct EtaEstimator {
    config: EtaConfig,
    offset: FixedOffset,
}

impl EtaEstimator {
    pub fn new(config: EtaConfig, offset: FixedOffset) -> Self {
        Self { config, offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn speed_for(&self, reported: Option<f64>) -> f64 {
        match reported {
            Some(speed) if speed > 0.0 && speed.is_finite() => speed,
            _ => self.config.default_speed_kmh,
        }
    }

    pub fn estimate(
        &self,
        location: Option<&DbBusLocation>,
        stop: &DbStop,
        now: DateTime<Utc>,
    ) -> EtaOutcome {
        let Some(location) = location else {
            return EtaOutcome::Unavailable;
        };
        let distance_km = haversine_km(
            GeoPoint::new(location.latitude, location.longitude),
            GeoPoint::new(stop.latitude, stop.longitude),
        );
        let speed_kmh = self.speed_for(location.speed_kmh);
        let Some(minutes) = travel_minutes(distance_km, speed_kmh, self.config.buffer_factor)
        else {
            return EtaOutcome::Unavailable;
        };
        let Some(arrives_at) =
            Duration::try_minutes(minutes).and_then(|d| now.checked_add_signed(d))
        else {
            return EtaOutcome::Unavailable;
        };

        let scheduled_at = stop
            .scheduled_time
            .and_then(|t| self.scheduled_instant(now, t));
        let (is_delayed, delay_minutes) = match scheduled_at {
            Some(scheduled) if arrives_at > scheduled => {
                (true, (arrives_at - scheduled).num_minutes().max(0))
            }
            _ => (false, 0),
        };

        EtaOutcome::Available(Eta {
            distance_km,
            speed_kmh,
            minutes,
            arrives_at,
            scheduled_at,
            is_delayed,
            delay_minutes,
            location_recorded_at: location.recorded_at,
        })
    }

    /// `time` on the local calendar day of `now`.
    fn scheduled_instant(&self, now: DateTime<Utc>, time: NaiveTime) -> Option<DateTime<Utc>> {
        let local_day = now.with_timezone(&self.offset).date_naive();
        self.offset
            .from_local_datetime(&local_day.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMPUS: GeoPoint = GeoPoint {
        lat: 23.8859,
        lon: 90.3971,
    };

    fn estimator() -> EtaEstimator {
        EtaEstimator::new(EtaConfig::default(), FixedOffset::east_opt(6 * 3600).unwrap())
    }

    fn location(speed: Option<f64>) -> DbBusLocation {
        DbBusLocation {
            id: 1,
            bus_id: 1,
            driver_id: None,
            latitude: CAMPUS.lat,
            longitude: CAMPUS.lon,
            speed_kmh: speed,
            heading: None,
            recorded_at: Utc::now(),
            is_active: true,
            is_simulated: false,
        }
    }

    fn stop(scheduled: Option<&str>) -> DbStop {
        DbStop {
            id: 1,
            route_id: 1,
            name: "Library".into(),
            latitude: 23.8859,
            longitude: 90.4071,
            stop_order: 0,
            scheduled_time: scheduled.map(|s| NaiveTime::parse_from_str(s, "%H:%M").unwrap()),
            average_wait_mins: 2,
            is_major_stop: false,
        }
    }

    /// 2025-03-01 08:00 at UTC+6.
    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap()
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(CAMPUS, CAMPUS), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let other = GeoPoint::new(23.75, 90.39);
        let d1 = haversine_km(CAMPUS, other);
        let d2 = haversine_km(other, CAMPUS);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_km(GeoPoint::new(23.0, 90.0), GeoPoint::new(24.0, 90.0));
        assert!((d - 111.0).abs() / 111.0 < 0.01, "got {d}");
    }

    #[test]
    fn travel_minutes_never_negative() {
        for d in [0.0, 0.1, 1.0, 25.0] {
            for s in [1.0, 30.0, 80.0] {
                assert!(travel_minutes(d, s, 1.2).is_some_and(|m| m >= 0));
            }
        }
    }

    #[test]
    fn travel_minutes_out_of_range_is_none() {
        assert_eq!(travel_minutes(1.0, 1e-12, 1.2), None);
        assert_eq!(travel_minutes(1.0, 0.0, 1.2), None);
        assert_eq!(travel_minutes(1.0, f64::NAN, 1.2), None);
        assert_eq!(travel_minutes(10.0, 30.0, 1.2), Some(24));
    }

    #[test]
    fn crawling_bus_has_no_estimate() {
        let outcome =
            estimator().estimate(Some(&location(Some(1e-12))), &stop(Some("08:00")), morning());
        assert_eq!(outcome, EtaOutcome::Unavailable);
    }

    #[test]
    fn campus_to_library_takes_two_minutes() {
        let outcome = estimator().estimate(Some(&location(None)), &stop(None), morning());
        let EtaOutcome::Available(eta) = outcome else {
            panic!("expected an estimate");
        };
        assert!((eta.distance_km - 1.0168).abs() < 0.001, "got {}", eta.distance_km);
        assert_eq!(eta.speed_kmh, 30.0);
        assert_eq!(eta.minutes, 2);
        assert!(!eta.is_delayed);
        assert_eq!(eta.delay_minutes, 0);
    }

    #[test]
    fn live_speed_wins_over_default() {
        let est = estimator();
        let fast = est.estimate(Some(&location(Some(60.0))), &stop(None), morning());
        assert_eq!(fast.minutes(), Some(1));
        let stopped = est.estimate(Some(&location(Some(0.0))), &stop(None), morning());
        assert_eq!(stopped.minutes(), Some(2));
    }

    #[test]
    fn no_location_is_unavailable() {
        let outcome = estimator().estimate(None, &stop(Some("08:00")), morning());
        assert_eq!(outcome, EtaOutcome::Unavailable);
        assert_eq!(outcome.minutes(), None);
    }

    #[test]
    fn delayed_only_when_strictly_after_schedule() {
        let est = estimator();
        // arrives 08:02 local
        let late = est.estimate(Some(&location(None)), &stop(Some("08:01")), morning());
        let EtaOutcome::Available(late) = late else {
            panic!("expected an estimate");
        };
        assert!(late.is_delayed);
        assert_eq!(late.delay_minutes, 1);

        let exact = est.estimate(Some(&location(None)), &stop(Some("08:02")), morning());
        let EtaOutcome::Available(exact) = exact else {
            panic!("expected an estimate");
        };
        assert!(!exact.is_delayed);
        assert_eq!(exact.delay_minutes, 0);

        let early = est.estimate(Some(&location(None)), &stop(Some("09:00")), morning());
        let EtaOutcome::Available(early) = early else {
            panic!("expected an estimate");
        };
        assert!(!early.is_delayed);
        assert_eq!(early.scheduled_at, Some(Utc.with_ymd_and_hms(2025, 3, 1, 3, 0, 0).unwrap()));
    }
}
