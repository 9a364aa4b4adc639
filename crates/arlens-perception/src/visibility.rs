//! Visibility / Selection policy.
//!
//! Decides which points of interest enter projection for the current tick:
//!
//! - distance cut-off from the active search radius,
//! - exact genre match (the "all" sentinel bypasses it),
//! - open-state and rating filters,
//! - zoom suppression: above the zoom threshold, anything nearer than the
//!   minimum distance is hidden so near venues don't swamp the zoomed-in
//!   far field.
//!
//! Survivors are ordered nearest first and capped at the filter's limit.
//!
//! # Example
//!
//! ```rust
//! use arlens_perception::visibility::VisibilityPolicy;
//! use arlens_types::{GeoPoint, PointOfInterest, SearchFilters, ZoomState};
//!
//! let origin = GeoPoint::new(35.0, 139.0);
//! let shop = PointOfInterest {
//!     id: "a".into(),
//!     position: GeoPoint::new(35.001, 139.0),
//!     name: "Cafe".into(),
//!     genre: "カフェ".into(),
//!     rating: None,
//!     thumbnail: String::new(),
//!     address: String::new(),
//!     is_open: None,
//!     catch_copy: String::new(),
//!     open_hours: String::new(),
//! };
//!
//! let policy = VisibilityPolicy::default();
//! let shops = [shop];
//! let visible = policy.filter_and_order(&shops, &SearchFilters::default(), ZoomState::default(), Some(origin));
//! assert_eq!(visible.len(), 1);
//! assert!((visible[0].distance_m - 111.2).abs() < 0.1);
//! ```

use std::cmp::Ordering;

use arlens_types::{GeoPoint, PointOfInterest, SearchFilters, ZoomState};

use crate::geodesy::{bearing_degrees, distance_meters};

/// A point of interest that passed the policy, with its geometry relative to
/// the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub poi: &'a PointOfInterest,
    pub distance_m: f64,
    pub bearing_deg: f64,
}

/// Filtering thresholds that are not user-selectable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityPolicy {
    /// Zoom magnification above which near venues are suppressed.
    pub zoom_suppression_threshold: f64,
    /// Minimum distance (metres) kept while zoom suppression is active.
    pub min_distance_when_zoomed_m: f64,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            zoom_suppression_threshold: 1.5,
            min_distance_when_zoomed_m: 200.0,
        }
    }
}

impl VisibilityPolicy {
    /// Filter `points` as seen from `origin` and order them nearest first.
    ///
    /// An absent or invalid `origin` (no position fix yet, or location
    /// permission denied) yields an empty set.
    pub fn filter_and_order<'a>(
        &self,
        points: &'a [PointOfInterest],
        filters: &SearchFilters,
        zoom: ZoomState,
        origin: Option<GeoPoint>,
    ) -> Vec<Candidate<'a>> {
        let Some(origin) = origin.filter(GeoPoint::is_valid) else {
            return Vec::new();
        };

        let mut candidates: Vec<Candidate<'a>> = points
            .iter()
            .filter(|poi| poi.position.is_valid())
            .filter_map(|poi| {
                let distance_m = distance_meters(origin, poi.position);
                self.accepts(poi, distance_m, filters, zoom).then(|| Candidate {
                    poi,
                    distance_m,
                    bearing_deg: bearing_degrees(origin, poi.position),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.poi.id.cmp(&b.poi.id))
        });
        candidates.truncate(filters.limit);
        candidates
    }

    /// Whether a single point at `distance_m` passes every filter.
    pub fn accepts(
        &self,
        poi: &PointOfInterest,
        distance_m: f64,
        filters: &SearchFilters,
        zoom: ZoomState,
    ) -> bool {
        if !distance_m.is_finite() || distance_m > filters.radius_m {
            return false;
        }
        if !filters.genre.matches(&poi.genre) {
            return false;
        }
        if filters.only_open && poi.is_open == Some(false) {
            return false;
        }
        let rating_ok = match (poi.rating, filters.min_rating) {
            (None, _) => filters.include_unrated,
            (Some(r), Some(min)) => r >= min,
            (Some(_), None) => true,
        };
        if !rating_ok {
            return false;
        }
        !self.suppressed_by_zoom(distance_m, zoom)
    }

    /// `true` when zoom is high enough that a venue this near is hidden.
    pub fn suppressed_by_zoom(&self, distance_m: f64, zoom: ZoomState) -> bool {
        zoom.magnification() > self.zoom_suppression_threshold
            && distance_m < self.min_distance_when_zoomed_m
    }
}

/// Look up the focused point for the detail view. Unknown or removed
/// identifiers resolve to `None`.
pub fn select<'a>(points: &'a [PointOfInterest], id: &str) -> Option<&'a PointOfInterest> {
    points.iter().find(|p| p.id == id)
}
