//! Synthetic movement along a closed loop of waypoints.

use rand::Rng;

use crate::service::eta::GeoPoint;

/// Radius of the loop built from a route's stops, in degrees.
pub const ROUTE_RADIUS_DEG: f64 = 0.02;
/// Radius and segment count of the fallback loop.
pub const DEFAULT_RADIUS_DEG: f64 = 0.015;
pub const DEFAULT_SEGMENTS: usize = 8;
/// Rough kilometres per degree, used to turn travelled distance into degrees.
pub const KM_PER_DEGREE: f64 = 111.0;
pub const JITTER_DEG: f64 = 0.0001;

/// `count` points evenly spaced on a circle, with the first point repeated
/// at the end to close the loop.
fn closed_circle(centre: GeoPoint, radius_deg: f64, count: usize) -> Vec<GeoPoint> {
    let mut path: Vec<GeoPoint> = (0..count)
        .map(|i| {
            let angle = i as f64 / count as f64 * std::f64::consts::TAU;
            GeoPoint::new(
                centre.lat + radius_deg * angle.cos(),
                centre.lon + radius_deg * angle.sin(),
            )
        })
        .collect();
    if let Some(first) = path.first().copied() {
        path.push(first);
    }
    path
}

/// One waypoint per stop when the route has at least two, otherwise the
/// default loop of `DEFAULT_SEGMENTS` segments.
pub fn build_path(centre: GeoPoint, stop_count: usize) -> Vec<GeoPoint> {
    if stop_count >= 2 {
        closed_circle(centre, ROUTE_RADIUS_DEG, stop_count)
    } else {
        closed_circle(centre, DEFAULT_RADIUS_DEG, DEFAULT_SEGMENTS)
    }
}

/// A fabricated sample ready to be stored as a location row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub point: GeoPoint,
    pub speed_kmh: f64,
    pub heading: f64,
}

#[derive(Debug, Clone)]
pub struct PathWalker {
    path: Vec<GeoPoint>,
    index: usize,
    progress: f64,
    speed_kmh: f64,
}

impl PathWalker {
    pub fn new(path: Vec<GeoPoint>, speed_kmh: f64) -> Self {
        Self {
            path,
            index: 0,
            progress: 0.0,
            speed_kmh,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    fn segment(&self) -> (GeoPoint, GeoPoint) {
        let next = (self.index + 1) % self.path.len();
        (self.path[self.index], self.path[next])
    }

    /// Move forward by `elapsed_secs` of travel. Reaching the next waypoint
    /// snaps onto it and resets progress. A zero-length segment (the closing
    /// point of the loop) is stepped over without accumulating progress.
    pub fn advance(&mut self, elapsed_secs: f64) {
        if self.path.len() < 2 {
            return;
        }
        let (from, to) = self.segment();
        let segment_deg = ((to.lat - from.lat).powi(2) + (to.lon - from.lon).powi(2)).sqrt();
        if segment_deg > 0.0 {
            let travelled_deg = self.speed_kmh / 3600.0 * elapsed_secs / KM_PER_DEGREE;
            self.progress += travelled_deg / segment_deg;
        }
        if segment_deg == 0.0 || self.progress >= 1.0 {
            self.index = (self.index + 1) % self.path.len();
            self.progress = 0.0;
        }
    }

    /// Interpolated position plus jitter, with a perturbed speed.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Sample> {
        if self.path.len() < 2 {
            return None;
        }
        let (from, to) = self.segment();
        let t = self.progress.min(1.0);
        let point = GeoPoint::new(
            from.lat + (to.lat - from.lat) * t + rng.gen_range(-JITTER_DEG..=JITTER_DEG),
            from.lon + (to.lon - from.lon) * t + rng.gen_range(-JITTER_DEG..=JITTER_DEG),
        );
        let heading = (to.lon - from.lon)
            .atan2(to.lat - from.lat)
            .to_degrees()
            .rem_euclid(360.0);
        Some(Sample {
            point,
            speed_kmh: self.speed_kmh * rng.gen_range(0.8..=1.2),
            heading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const CENTRE: GeoPoint = GeoPoint {
        lat: 23.8859,
        lon: 90.3971,
    };

    #[test]
    fn default_loop_has_nine_closed_points() {
        let path = build_path(CENTRE, 1);
        assert_eq!(path.len(), DEFAULT_SEGMENTS + 1);
        assert_eq!(path.first(), path.last());
        assert!((path[0].lat - (CENTRE.lat + DEFAULT_RADIUS_DEG)).abs() < 1e-12);
    }

    #[test]
    fn route_loop_has_one_point_per_stop() {
        let path = build_path(CENTRE, 4);
        assert_eq!(path.len(), 5);
        assert_eq!(path[0], path[4]);
        assert!((path[1].lon - (CENTRE.lon + ROUTE_RADIUS_DEG)).abs() < 1e-12);
    }

    #[test]
    fn progress_wraps_around_the_loop() {
        let path = build_path(CENTRE, 3);
        let len = path.len();
        // fast enough to finish any segment in one step
        let mut walker = PathWalker::new(path, 10_000.0);
        for step in 1..=len {
            walker.advance(60.0);
            assert_eq!(walker.index(), step % len);
            assert_eq!(walker.progress(), 0.0);
        }
    }

    #[test]
    fn zero_length_segment_is_stepped_over() {
        let walker_path = vec![CENTRE, CENTRE, GeoPoint::new(CENTRE.lat + 0.01, CENTRE.lon)];
        let mut walker = PathWalker::new(walker_path, 30.0);
        walker.advance(10.0);
        assert_eq!(walker.index(), 1);
        assert_eq!(walker.progress(), 0.0);
    }

    #[test]
    fn partial_progress_accumulates() {
        let mut walker = PathWalker::new(build_path(CENTRE, 1), 30.0);
        walker.advance(10.0);
        assert_eq!(walker.index(), 0);
        assert!(walker.progress() > 0.0 && walker.progress() < 1.0);
    }

    #[test]
    fn jitter_and_speed_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let walker = PathWalker::new(build_path(CENTRE, 1), 30.0);
        let start = build_path(CENTRE, 1)[0];
        for _ in 0..500 {
            let sample = walker.sample(&mut rng).unwrap();
            assert!((sample.point.lat - start.lat).abs() <= JITTER_DEG + 1e-12);
            assert!((sample.point.lon - start.lon).abs() <= JITTER_DEG + 1e-12);
            assert!((24.0..=36.0).contains(&sample.speed_kmh));
            assert!((0.0..360.0).contains(&sample.heading));
        }
    }
}
