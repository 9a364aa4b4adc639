//! Deterministic device-motion script for the simulated sensors.
//!
//! A [`Scenario`] describes a user standing at `origin`, slowly turning on
//! the spot while walking in a straight line. Every simulated driver samples
//! the same script, so compass, gyroscope and GPS readings stay mutually
//! consistent and a replay is reproducible run to run.
//!
//! Sensor noise is a fixed sinusoid, not a random source.

use arlens_types::{GeoPoint, normalize_degrees};

/// Metres per degree of latitude on the 6 371 km sphere.
const METRES_PER_DEGREE: f64 = 111_194.93;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    /// Where the walk starts.
    pub origin: GeoPoint,
    /// True heading at `t = 0`.
    pub start_heading_deg: f64,
    /// Turning rate, positive clockwise (deg/s).
    pub turn_rate_deg_s: f64,
    /// Walking speed (m/s). `0.0` stands still.
    pub walk_speed_m_s: f64,
    /// Direction of travel.
    pub walk_bearing_deg: f64,
    /// Peak compass noise (deg).
    pub compass_jitter_deg: f64,
    /// Gyroscope bias integrated into the yaw signal (deg/s).
    pub gyro_drift_deg_s: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            origin: GeoPoint::new(35.6595, 139.7005),
            start_heading_deg: 0.0,
            turn_rate_deg_s: 6.0,
            walk_speed_m_s: 1.2,
            walk_bearing_deg: 90.0,
            compass_jitter_deg: 2.0,
            gyro_drift_deg_s: 0.5,
        }
    }
}

impl Scenario {
    /// A scenario that stays put at `origin` facing `heading_deg`.
    pub fn stationary(origin: GeoPoint, heading_deg: f64) -> Self {
        Self {
            origin,
            start_heading_deg: heading_deg,
            turn_rate_deg_s: 0.0,
            walk_speed_m_s: 0.0,
            ..Self::default()
        }
    }

    /// Noise-free true heading at time `t` seconds, in `[0, 360)`.
    pub fn heading_at(&self, t: f64) -> f64 {
        normalize_degrees(self.start_heading_deg + self.turn_rate_deg_s * t)
    }

    /// What the compass reports at `t`: the true heading plus jitter.
    pub fn compass_at(&self, t: f64) -> f64 {
        normalize_degrees(self.heading_at(t) + self.compass_jitter_deg * (t * 7.3).sin())
    }

    /// Cumulative, unwrapped gyroscope yaw at `t` in radians. Starts at zero
    /// and includes the configured drift.
    pub fn gyro_yaw_rad_at(&self, t: f64) -> f64 {
        ((self.turn_rate_deg_s + self.gyro_drift_deg_s) * t).to_radians()
    }

    /// A gentle nodding pitch (±5°) in radians.
    pub fn pitch_rad_at(&self, t: f64) -> f64 {
        (5.0 * (0.5 * t).sin()).to_radians()
    }

    /// Distance walked from the origin by `t` (m).
    pub fn walked_m(&self, t: f64) -> f64 {
        (self.walk_speed_m_s * t).max(0.0)
    }

    /// Device position at `t`, using a local flat-earth offset from `origin`.
    pub fn position_at(&self, t: f64) -> GeoPoint {
        let d = self.walked_m(t);
        let b = self.walk_bearing_deg.to_radians();
        let north = d * b.cos();
        let east = d * b.sin();
        let lat = self.origin.latitude + north / METRES_PER_DEGREE;
        let lng = self.origin.longitude
            + east / (METRES_PER_DEGREE * self.origin.latitude.to_radians().cos());
        GeoPoint::new(lat, lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_turns_and_wraps() {
        let s = Scenario {
            start_heading_deg: 350.0,
            turn_rate_deg_s: 10.0,
            ..Scenario::default()
        };
        assert!((s.heading_at(0.0) - 350.0).abs() < 1e-9);
        assert!((s.heading_at(2.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn counter_clockwise_turn_stays_in_range() {
        let s = Scenario {
            start_heading_deg: 0.0,
            turn_rate_deg_s: -15.0,
            compass_jitter_deg: 0.0,
            ..Scenario::default()
        };
        assert!((s.heading_at(1.0) - 345.0).abs() < 1e-9);
        for i in 0..240 {
            let t = i as f64 * 0.5;
            assert!((0.0..360.0).contains(&s.heading_at(t)));
            assert!((0.0..360.0).contains(&s.compass_at(t)));
        }
    }

    #[test]
    fn compass_noise_is_bounded() {
        let s = Scenario::default();
        for i in 0..600 {
            let t = i as f64 * 0.1;
            let diff = (s.compass_at(t) - s.heading_at(t) + 540.0).rem_euclid(360.0) - 180.0;
            assert!(diff.abs() <= s.compass_jitter_deg + 1e-9);
        }
    }

    #[test]
    fn gyro_yaw_is_unwrapped() {
        let s = Scenario::default();
        let yaw = s.gyro_yaw_rad_at(120.0);
        assert!(yaw > std::f64::consts::TAU, "yaw {yaw} should exceed one turn");
    }

    #[test]
    fn stationary_position_stays_at_origin() {
        let origin = GeoPoint::new(35.0, 139.0);
        let s = Scenario::stationary(origin, 45.0);
        assert_eq!(s.position_at(300.0), origin);
        assert_eq!(s.heading_at(300.0), 45.0);
    }

    #[test]
    fn walking_east_moves_longitude_only() {
        let s = Scenario {
            walk_speed_m_s: 10.0,
            walk_bearing_deg: 90.0,
            ..Scenario::default()
        };
        let p = s.position_at(10.0);
        assert!((p.latitude - s.origin.latitude).abs() < 1e-9);
        assert!(p.longitude > s.origin.longitude);
        assert!((s.walked_m(10.0) - 100.0).abs() < 1e-9);
    }
}
