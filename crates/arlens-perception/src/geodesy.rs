//! Geodesy utilities.
//!
//! Pure functions over [`GeoPoint`]s on a spherical Earth:
//!
//! - [`distance_meters`] – haversine great-circle distance.
//! - [`bearing_degrees`] – initial compass bearing, normalized to `[0, 360)`.
//! - [`normalize_degrees`] / [`signed_delta`] – re-exported from
//!   `arlens_types` so perception code keeps one import path.
//! - [`extract_floor_level`] – best-effort floor number from an address.
//!
//! # Example
//!
//! ```rust
//! use arlens_perception::geodesy::{bearing_degrees, distance_meters};
//! use arlens_types::GeoPoint;
//!
//! let a = GeoPoint::new(35.0, 139.0);
//! let b = GeoPoint::new(36.0, 139.0);
//!
//! let d = distance_meters(a, b);
//! assert!((d - 111_195.0).abs() < 1_000.0);
//! assert!(bearing_degrees(a, b) < 1e-9);
//! ```

use std::sync::LazyLock;

pub use arlens_types::{normalize_degrees, signed_delta};
use arlens_types::GeoPoint;
use regex::Regex;

/// Mean Earth radius used by the haversine formula (metres).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Floor returned when no floor marker is found in an address.
pub const DEFAULT_FLOOR: i32 = 1;

// "<digits> F", "<digits>f" or "<digits>階", optionally separated by spaces.
static FLOOR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(階|F|f)").ok());

/// Great-circle distance between `a` and `b` in metres.
///
/// Symmetric in its arguments and exactly `0.0` for identical points.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees clockwise from north, in
/// `[0, 360)`.
///
/// The bearing from a point to itself is meaningless; this returns `0.0`.
pub fn bearing_degrees(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let y = d_lng.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lng.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Parse a floor number out of a free-form address.
///
/// Looks for the first run of digits followed by a floor marker (`F`, `f`
/// or `階`). Returns [`DEFAULT_FLOOR`] when nothing matches or the number
/// does not fit. This is a display hint only: addresses such as `B1F` or
/// room numbers next to an `F` are misread, and callers must not rely on it
/// for anything beyond panel placement.
pub fn extract_floor_level(address: &str) -> i32 {
    FLOOR_PATTERN
        .as_ref()
        .and_then(|re| re.captures(address))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(DEFAULT_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng)
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (p(35.6812, 139.7671), p(35.6586, 139.7454)),
            (p(-33.86, 151.21), p(51.5, -0.12)),
            (p(0.0, 179.9), p(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = p(35.6812, 139.7671);
        assert_eq!(distance_meters(a, a), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = p(35.0, 139.0);
        let b = p(36.0, 139.0);
        let d = distance_meters(a, b);
        assert!((d - 111_320.0).abs() < 111_320.0 * 0.01, "got {d}");
    }

    #[test]
    fn bearing_due_north_and_south() {
        let a = p(35.0, 139.0);
        let b = p(36.0, 139.0);
        assert!(bearing_degrees(a, b).abs() < 1e-9);
        assert!((bearing_degrees(b, a) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_east_and_west() {
        let a = p(0.0, 0.0);
        assert!((bearing_degrees(a, p(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(a, p(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_always_in_range() {
        let origin = p(35.68, 139.76);
        for i in 0..72 {
            let theta = (i as f64 * 5.0).to_radians();
            let target = p(35.68 + 0.01 * theta.cos(), 139.76 + 0.01 * theta.sin());
            let b = bearing_degrees(origin, target);
            assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
        }
    }

    #[test]
    fn floor_from_ascii_marker() {
        assert_eq!(extract_floor_level("東京都千代田区丸の内1-9-1 3F"), 3);
        assert_eq!(extract_floor_level("Building 12f"), 12);
        assert_eq!(extract_floor_level("Tower 5 F"), 5);
    }

    #[test]
    fn floor_from_cjk_marker() {
        assert_eq!(extract_floor_level("渋谷区道玄坂2-29-1 7階"), 7);
    }

    #[test]
    fn floor_defaults_when_absent_or_malformed() {
        assert_eq!(extract_floor_level(""), DEFAULT_FLOOR);
        assert_eq!(extract_floor_level("港区六本木6-10-1"), DEFAULT_FLOOR);
        assert_eq!(extract_floor_level("99999999999F"), DEFAULT_FLOOR);
    }
}
