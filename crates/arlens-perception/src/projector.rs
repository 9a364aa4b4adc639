//! Projector.
//!
//! Maps a target's absolute bearing, the stabilized heading, the zoom
//! magnification and the distance to a [`ProjectedPanel`]. The mapping is a
//! flat angular strip, not a perspective transform:
//!
//! 1. `relative = shortest(bearing − heading)` in `(-180, 180]`
//! 2. `x = relative · K · zoom` (percent of viewport width)
//! 3. `focus = max(0, 1 − |x| / focus_half_width)`
//! 4. distance → discrete `(stage_scale, stage_opacity)`
//! 5. `scale = stage_scale · (1 + focus · 0.2)`
//! 6. `edge = clamp(lerp(|x|, [40, 60] → [1, 0]))`
//! 7. `opacity = stage_opacity · edge · (0.8 + focus · 0.2)`
//! 8. `z = floor(10000 / distance)`, clamped for tiny distances
//! 9. `emphasized = focus >= 0.8`
//!
//! Panels whose edge opacity reaches zero are not emitted at all, so they
//! can never be hit-tested while invisible.
//!
//! The projector holds only configuration. Nothing is cached between calls;
//! heading and zoom change every frame and panels are recomputed from
//! scratch.
//!
//! # Example
//!
//! ```rust
//! use arlens_perception::projector::{Projector, ProjectorConfig};
//! use arlens_types::ZoomState;
//!
//! let projector = Projector::new(ProjectorConfig::default());
//! let panel = projector
//!     .project(90.0, 90.0, ZoomState::default(), 250.0, 0.0)
//!     .unwrap();
//!
//! assert_eq!(panel.screen_x, 0.0);
//! assert!((panel.scale - 1.2).abs() < 1e-9);
//! assert!(panel.emphasized);
//! ```

use arlens_types::{GeoPoint, PointOfInterest, ProjectedPanel, ZoomState};

use crate::geodesy::{bearing_degrees, distance_meters, extract_floor_level, signed_delta};

/// One distance bracket with a fixed visual weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStage {
    /// Inclusive upper bound (metres). The last stage uses `f64::INFINITY`.
    pub max_distance_m: f64,
    pub scale: f64,
    pub opacity: f64,
}

impl DistanceStage {
    const fn new(max_distance_m: f64, weight: f64) -> Self {
        Self {
            max_distance_m,
            scale: weight,
            opacity: weight,
        }
    }
}

/// Reference stages: a step function, not a continuous falloff, so panels
/// at similar distances look identical and far panels stay readable.
pub const DEFAULT_STAGES: [DistanceStage; 5] = [
    DistanceStage::new(300.0, 1.0),
    DistanceStage::new(500.0, 0.9),
    DistanceStage::new(1000.0, 0.8),
    DistanceStage::new(2000.0, 0.7),
    DistanceStage::new(f64::INFINITY, 0.6),
];

/// Camera framing, selecting the angular-to-percent gain `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Portrait,
    Landscape,
}

impl Framing {
    /// Percent of viewport width per degree of relative bearing.
    pub fn angular_gain(self) -> f64 {
        match self {
            Framing::Portrait => 1.5,
            Framing::Landscape => 2.5,
        }
    }
}

/// Tuning constants for [`Projector`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorConfig {
    /// Gain `K` in `x = relative · K · zoom`.
    pub angular_gain: f64,
    /// `|x|` at which focus intensity reaches zero.
    pub focus_half_width: f64,
    /// `|x|` where the edge fade begins.
    pub cone_edge_start: f64,
    /// `|x|` where panels become fully transparent and are dropped.
    pub cone_edge_end: f64,
    /// Extra scale for a perfectly centred panel.
    pub focus_scale_boost: f64,
    /// Opacity multiplier for an unfocused panel (rises to 1.0 at centre).
    pub unfocused_opacity: f64,
    /// Focus intensity at or above which a panel is emphasized.
    pub emphasis_threshold: f64,
    /// `C` in `z = floor(C / distance)`.
    pub z_index_numerator: f64,
    /// Upper bound for the z-index (reached as distance approaches zero).
    pub z_index_max: u32,
    /// Vertical offset per floor above ground (percent of viewport height).
    pub floor_offset_percent: f64,
    /// Distance stages, ascending by `max_distance_m`.
    pub stages: Vec<DistanceStage>,
}

impl ProjectorConfig {
    pub fn for_framing(framing: Framing) -> Self {
        Self {
            angular_gain: framing.angular_gain(),
            ..Self::default()
        }
    }
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            angular_gain: Framing::Portrait.angular_gain(),
            focus_half_width: 30.0,
            cone_edge_start: 40.0,
            cone_edge_end: 60.0,
            focus_scale_boost: 0.2,
            unfocused_opacity: 0.8,
            emphasis_threshold: 0.8,
            z_index_numerator: 10_000.0,
            z_index_max: 10_000,
            floor_offset_percent: 8.0,
            stages: DEFAULT_STAGES.to_vec(),
        }
    }
}

/// Stateless bearing-to-screen mapper. Cheap to clone and safe to share
/// with a render loop running on another task.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    config: ProjectorConfig,
}

impl Projector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Project one target.
    ///
    /// Returns `None` when the panel falls outside the visibility cone, or
    /// when any input is non-finite or the distance is negative.
    pub fn project(
        &self,
        bearing_deg: f64,
        heading_deg: f64,
        zoom: ZoomState,
        distance_m: f64,
        vertical_offset: f64,
    ) -> Option<ProjectedPanel> {
        if !bearing_deg.is_finite()
            || !heading_deg.is_finite()
            || !distance_m.is_finite()
            || distance_m < 0.0
            || !vertical_offset.is_finite()
        {
            return None;
        }
        let cfg = &self.config;

        let relative = signed_delta(heading_deg, bearing_deg);
        let screen_x = relative * cfg.angular_gain * zoom.magnification();
        let offset = screen_x.abs();

        let edge = self.edge_opacity(offset);
        if edge <= 0.0 {
            return None;
        }

        let focus = self.focus_intensity(offset);
        let stage = self.stage_for(distance_m);

        Some(ProjectedPanel {
            screen_x,
            screen_y: vertical_offset,
            scale: stage.scale * (1.0 + focus * cfg.focus_scale_boost),
            opacity: stage.opacity
                * edge
                * (cfg.unfocused_opacity + focus * (1.0 - cfg.unfocused_opacity)),
            z_index: self.z_index(distance_m),
            emphasized: focus >= cfg.emphasis_threshold,
        })
    }

    /// Project a point of interest as seen from `origin`.
    ///
    /// The vertical offset is derived from the floor level parsed out of the
    /// address.
    pub fn project_point(
        &self,
        poi: &PointOfInterest,
        origin: GeoPoint,
        heading_deg: f64,
        zoom: ZoomState,
    ) -> Option<ProjectedPanel> {
        if !origin.is_valid() || !poi.position.is_valid() {
            return None;
        }
        let distance = distance_meters(origin, poi.position);
        let bearing = bearing_degrees(origin, poi.position);
        let floor = extract_floor_level(&poi.address);
        self.project(
            bearing,
            heading_deg,
            zoom,
            distance,
            self.vertical_offset_for_floor(floor),
        )
    }

    /// Vertical placement for a floor: ground floor sits on the horizon.
    pub fn vertical_offset_for_floor(&self, floor: i32) -> f64 {
        f64::from(floor - 1) * self.config.floor_offset_percent
    }

    /// The stage for `distance_m`; a distance equal to a boundary belongs to
    /// the nearer stage.
    pub fn stage_for(&self, distance_m: f64) -> DistanceStage {
        self.config
            .stages
            .iter()
            .find(|s| distance_m <= s.max_distance_m)
            .or_else(|| self.config.stages.last())
            .copied()
            .unwrap_or(DistanceStage::new(f64::INFINITY, 1.0))
    }

    fn focus_intensity(&self, offset: f64) -> f64 {
        let half = self.config.focus_half_width;
        if half <= 0.0 {
            return if offset == 0.0 { 1.0 } else { 0.0 };
        }
        (1.0 - offset / half).max(0.0)
    }

    fn edge_opacity(&self, offset: f64) -> f64 {
        let (start, end) = (self.config.cone_edge_start, self.config.cone_edge_end);
        if offset <= start {
            return 1.0;
        }
        if offset >= end || end <= start {
            return 0.0;
        }
        (1.0 - (offset - start) / (end - start)).clamp(0.0, 1.0)
    }

    fn z_index(&self, distance_m: f64) -> u32 {
        let max = self.config.z_index_max;
        if distance_m <= 0.0 {
            return max;
        }
        let z = (self.config.z_index_numerator / distance_m).floor();
        if z >= f64::from(max) { max } else { z.max(0.0) as u32 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projector() -> Projector {
        Projector::new(ProjectorConfig::default())
    }

    fn zoom(m: f64) -> ZoomState {
        ZoomState::new(m)
    }

    #[test]
    fn on_heading_is_centred_and_emphasized() {
        let panel = projector().project(120.0, 120.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert_eq!(panel.screen_x, 0.0);
        assert!((panel.scale - 1.2).abs() < 1e-12);
        assert!((panel.opacity - 1.0).abs() < 1e-12);
        assert!(panel.emphasized);
    }

    #[test]
    fn emphasis_holds_for_threshold_of_one() {
        let p = Projector::new(ProjectorConfig {
            emphasis_threshold: 1.0,
            ..ProjectorConfig::default()
        });
        assert!(p.project(0.0, 0.0, zoom(1.0), 10.0, 0.0).unwrap().emphasized);
    }

    #[test]
    fn relative_bearing_wraps_across_north() {
        let p = projector();
        // Target at 5°, facing 355° → 10° to the right.
        let panel = p.project(5.0, 355.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert!((panel.screen_x - 15.0).abs() < 1e-9);
        // Target at 355°, facing 5° → 10° to the left.
        let panel = p.project(355.0, 5.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert!((panel.screen_x + 15.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_multiplies_angular_gain() {
        let panel = projector().project(10.0, 0.0, zoom(2.0), 100.0, 0.0).unwrap();
        assert!((panel.screen_x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn landscape_framing_uses_wider_gain() {
        let p = Projector::new(ProjectorConfig::for_framing(Framing::Landscape));
        let panel = p.project(10.0, 0.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert!((panel.screen_x - 25.0).abs() < 1e-9);
    }

    #[test]
    fn beyond_cone_edge_is_dropped() {
        let p = projector();
        // 45° · 1.5 = 67.5 > 60.
        assert!(p.project(45.0, 0.0, zoom(1.0), 100.0, 0.0).is_none());
        // Exactly on the edge has zero opacity and is dropped too.
        assert!(p.project(40.0, 0.0, zoom(1.0), 100.0, 0.0).is_none());
        // Directly behind.
        assert!(p.project(180.0, 0.0, zoom(1.0), 100.0, 0.0).is_none());
    }

    #[test]
    fn edge_fade_is_linear() {
        // 30° · 1.5 = 45 → a quarter of the way through the fade.
        let panel = projector().project(30.0, 0.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert!((panel.screen_x - 45.0).abs() < 1e-9);
        // No focus at |x| = 45: 1.0 · 0.75 · 0.8.
        assert!((panel.opacity - 0.6).abs() < 1e-9);
        assert!((panel.scale - 1.0).abs() < 1e-9);
        assert!(!panel.emphasized);
    }

    #[test]
    fn focus_partially_boosts_scale() {
        // 10° · 1.5 = 15 → focus 0.5.
        let panel = projector().project(10.0, 0.0, zoom(1.0), 100.0, 0.0).unwrap();
        assert!((panel.scale - 1.1).abs() < 1e-9);
        assert!((panel.opacity - 0.9).abs() < 1e-9);
        assert!(!panel.emphasized);
    }

    #[test]
    fn distance_stage_boundaries_belong_to_lower_stage() {
        let p = projector();
        let cases = [
            (0.0, 1.0),
            (300.0, 1.0),
            (300.1, 0.9),
            (500.0, 0.9),
            (1000.0, 0.8),
            (2000.0, 0.7),
            (2000.5, 0.6),
            (5000.0, 0.6),
        ];
        for (d, w) in cases {
            let stage = p.stage_for(d);
            assert_eq!(stage.scale, w, "scale at {d}");
            assert_eq!(stage.opacity, w, "opacity at {d}");
        }
    }

    #[test]
    fn centred_panel_gets_full_stage_weight() {
        let p = projector();
        for (d, w) in [(300.0, 1.0), (500.0, 0.9), (1000.0, 0.8), (2000.0, 0.7), (5000.0, 0.6)] {
            let panel = p.project(0.0, 0.0, zoom(1.0), d, 0.0).unwrap();
            assert!((panel.scale - w * 1.2).abs() < 1e-9);
            assert!((panel.opacity - w).abs() < 1e-9);
        }
    }

    #[test]
    fn z_index_orders_near_over_far() {
        let p = projector();
        let near = p.project(0.0, 0.0, zoom(1.0), 100.0, 0.0).unwrap();
        let far = p.project(0.0, 0.0, zoom(1.0), 1000.0, 0.0).unwrap();
        assert_eq!(near.z_index, 100);
        assert_eq!(far.z_index, 10);
        assert!(near.z_index > far.z_index);
    }

    #[test]
    fn z_index_clamps_at_zero_distance() {
        let p = projector();
        assert_eq!(p.project(0.0, 0.0, zoom(1.0), 0.0, 0.0).unwrap().z_index, 10_000);
        assert_eq!(p.project(0.0, 0.0, zoom(1.0), 0.25, 0.0).unwrap().z_index, 10_000);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let p = projector();
        assert!(p.project(f64::NAN, 0.0, zoom(1.0), 100.0, 0.0).is_none());
        assert!(p.project(0.0, f64::INFINITY, zoom(1.0), 100.0, 0.0).is_none());
        assert!(p.project(0.0, 0.0, zoom(1.0), -1.0, 0.0).is_none());
        assert!(p.project(0.0, 0.0, zoom(1.0), f64::NAN, 0.0).is_none());
    }

    #[test]
    fn outputs_are_never_negative() {
        let p = projector();
        for b in 0..360 {
            for d in [0.0, 50.0, 750.0, 9000.0] {
                if let Some(panel) = p.project(b as f64, 0.0, zoom(1.7), d, 0.0) {
                    assert!(panel.opacity > 0.0);
                    assert!(panel.scale > 0.0);
                    assert!(panel.screen_x.abs() < 60.0);
                }
            }
        }
    }

    #[test]
    fn project_point_uses_geodesy_and_floor() {
        let p = projector();
        let origin = GeoPoint::new(35.0, 139.0);
        let poi = PointOfInterest {
            id: "s1".into(),
            position: GeoPoint::new(35.001, 139.0),
            name: "North Noodles".into(),
            genre: "ラーメン".into(),
            rating: None,
            thumbnail: String::new(),
            address: "中央区銀座4-1 3F".into(),
            is_open: Some(true),
            catch_copy: String::new(),
            open_hours: String::new(),
        };
        let panel = p.project_point(&poi, origin, 0.0, zoom(1.0)).unwrap();
        assert!(panel.screen_x.abs() < 1e-6);
        assert!((panel.screen_y - 16.0).abs() < 1e-9);
        // ~111 m away.
        assert_eq!(panel.z_index, 89);

        // Facing south, the same point is behind the viewer.
        assert!(p.project_point(&poi, origin, 180.0, zoom(1.0)).is_none());
    }
}
