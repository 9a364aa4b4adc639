//! Per-frame overlay composition and tap selection.
//!
//! [`compose`] runs the visibility policy and the projector for one
//! animation tick and returns an [`OverlayFrame`]: the panels to draw,
//! back-to-front. Frames are recomputed from scratch every tick and never
//! cached, because heading and zoom move continuously.
//!
//! [`Presenter`] adds presentation smoothing: it eases the displayed heading
//! toward the stabilized heading with a critically-damped spring before
//! composing.
//!
//! # Example
//!
//! ```rust
//! use arlens_runtime::overlay::Presenter;
//! use arlens_types::{GeoPoint, PointOfInterest, SearchFilters, ZoomState};
//!
//! let origin = GeoPoint::new(35.0, 139.0);
//! let shop = PointOfInterest {
//!     id: "north".into(),
//!     position: GeoPoint::new(35.002, 139.0),
//!     name: "Kissa".into(),
//!     genre: "カフェ".into(),
//!     rating: Some(4.0),
//!     thumbnail: String::new(),
//!     address: "1F".into(),
//!     is_open: Some(true),
//!     catch_copy: String::new(),
//!     open_hours: String::new(),
//! };
//!
//! let mut presenter = Presenter::default();
//! let frame = presenter.frame(
//!     1.0 / 60.0,
//!     0.0,
//!     &[shop],
//!     &SearchFilters::default(),
//!     ZoomState::default(),
//!     Some(origin),
//! );
//! assert_eq!(frame.panels.len(), 1);
//! assert!(frame.panels[0].panel.emphasized);
//! ```

use arlens_perception::geodesy::extract_floor_level;
use arlens_perception::visibility::select;
use arlens_perception::{AngularSpring, Projector, SpringConfig, VisibilityPolicy};
use arlens_types::{GeoPoint, PointOfInterest, ProjectedPanel, SearchFilters, ZoomState};
use tracing::{debug, trace};

/// One panel ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPanel {
    pub id: String,
    pub name: String,
    pub genre: String,
    pub distance_m: f64,
    pub rating: Option<f32>,
    pub panel: ProjectedPanel,
}

/// Everything drawn for one animation tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayFrame {
    /// The heading the frame was projected with.
    pub heading_deg: f64,
    pub zoom: ZoomState,
    /// Sorted by ascending `z_index`: draw in order.
    pub panels: Vec<RenderedPanel>,
}

impl OverlayFrame {
    pub fn contains(&self, id: &str) -> bool {
        self.panels.iter().any(|p| p.id == id)
    }

    /// Panels inside the focus cone.
    pub fn emphasized(&self) -> impl Iterator<Item = &RenderedPanel> {
        self.panels.iter().filter(|p| p.panel.emphasized)
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

/// Filter, project and order `points` for a single tick.
///
/// Points outside the visible cone are left out rather than drawn at zero
/// opacity.
pub fn compose(
    projector: &Projector,
    policy: &VisibilityPolicy,
    points: &[PointOfInterest],
    filters: &SearchFilters,
    zoom: ZoomState,
    origin: Option<GeoPoint>,
    heading_deg: f64,
) -> OverlayFrame {
    let candidates = policy.filter_and_order(points, filters, zoom, origin);
    let considered = candidates.len();

    let mut panels: Vec<RenderedPanel> = candidates
        .into_iter()
        .filter_map(|c| {
            let floor = extract_floor_level(&c.poi.address);
            let panel = projector.project(
                c.bearing_deg,
                heading_deg,
                zoom,
                c.distance_m,
                projector.vertical_offset_for_floor(floor),
            )?;
            Some(RenderedPanel {
                id: c.poi.id.clone(),
                name: c.poi.name.clone(),
                genre: c.poi.genre.clone(),
                distance_m: c.distance_m,
                rating: c.poi.rating,
                panel,
            })
        })
        .collect();

    // Stable: equal z keeps the nearest-first order.
    panels.sort_by_key(|p| p.panel.z_index);
    trace!(considered, drawn = panels.len(), heading_deg, "overlay composed");

    OverlayFrame {
        heading_deg,
        zoom,
        panels,
    }
}

/// Render-loop helper: smooths the heading and composes frames.
#[derive(Debug, Clone)]
pub struct Presenter {
    projector: Projector,
    policy: VisibilityPolicy,
    spring: AngularSpring,
    primed: bool,
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(Projector::default(), VisibilityPolicy::default(), SpringConfig::default())
    }
}

impl Presenter {
    pub fn new(projector: Projector, policy: VisibilityPolicy, spring: SpringConfig) -> Self {
        Self {
            projector,
            policy,
            spring: AngularSpring::new(spring, 0.0),
            primed: false,
        }
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn set_projector(&mut self, projector: Projector) {
        self.projector = projector;
    }

    /// The heading shown by the last frame.
    pub fn displayed_heading(&self) -> f64 {
        self.spring.value()
    }

    /// Advance by `dt` seconds toward `stabilized_heading` and compose.
    ///
    /// The first frame snaps to the stabilized heading instead of sweeping
    /// in from north.
    pub fn frame(
        &mut self,
        dt: f64,
        stabilized_heading: f64,
        points: &[PointOfInterest],
        filters: &SearchFilters,
        zoom: ZoomState,
        origin: Option<GeoPoint>,
    ) -> OverlayFrame {
        let heading = if self.primed {
            self.spring.set_target(stabilized_heading);
            self.spring.update(dt)
        } else {
            self.spring.reset(stabilized_heading);
            self.primed = true;
            self.spring.value()
        };
        compose(
            &self.projector,
            &self.policy,
            points,
            filters,
            zoom,
            origin,
            heading,
        )
    }
}

/// The point currently opened in the detail view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    /// Select `id` if it is drawn in `frame`. Returns whether the tap hit.
    pub fn tap(&mut self, id: &str, frame: &OverlayFrame) -> bool {
        if frame.contains(id) {
            debug!(id, "panel selected");
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected point in the current result set. A selection whose
    /// point has since been replaced out resolves to `None`.
    pub fn resolve<'a>(&self, points: &'a [PointOfInterest]) -> Option<&'a PointOfInterest> {
        select(points, self.selected.as_deref()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 35.0,
        longitude: 139.0,
    };

    /// A point `d` metres from [`ORIGIN`] along `bearing_deg`.
    fn poi(id: &str, d: f64, bearing_deg: f64, address: &str) -> PointOfInterest {
        let b = bearing_deg.to_radians();
        let m = 111_194.93;
        PointOfInterest {
            id: id.into(),
            position: GeoPoint::new(
                ORIGIN.latitude + d * b.cos() / m,
                ORIGIN.longitude + d * b.sin() / (m * ORIGIN.latitude.to_radians().cos()),
            ),
            name: id.into(),
            genre: "和食".into(),
            rating: None,
            thumbnail: String::new(),
            address: address.into(),
            is_open: None,
            catch_copy: String::new(),
            open_hours: String::new(),
        }
    }

    fn frame_at(points: &[PointOfInterest], heading: f64) -> OverlayFrame {
        compose(
            &Projector::default(),
            &VisibilityPolicy::default(),
            points,
            &SearchFilters::default(),
            ZoomState::default(),
            Some(ORIGIN),
            heading,
        )
    }

    #[test]
    fn behind_the_viewer_is_not_drawn() {
        let points = [poi("ahead", 100.0, 0.0, ""), poi("behind", 100.0, 180.0, "")];
        let frame = frame_at(&points, 0.0);
        assert!(frame.contains("ahead"));
        assert!(!frame.contains("behind"));
    }

    #[test]
    fn panels_sorted_back_to_front() {
        let points = [poi("near", 80.0, 0.0, ""), poi("far", 900.0, 2.0, "")];
        let frame = frame_at(&points, 0.0);
        let ids: Vec<&str> = frame.panels.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["far", "near"]);
        assert!(frame.panels[0].panel.z_index < frame.panels[1].panel.z_index);
    }

    #[test]
    fn floor_raises_panel() {
        let points = [poi("ground", 100.0, 0.0, "1F"), poi("third", 120.0, 0.0, "ビル 3階")];
        let frame = frame_at(&points, 0.0);
        let y = |id: &str| {
            frame
                .panels
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.panel.screen_y)
        };
        assert_eq!(y("ground"), Some(0.0));
        assert_eq!(y("third"), Some(16.0));
    }

    #[test]
    fn no_position_means_empty_frame() {
        let points = [poi("a", 100.0, 0.0, "")];
        let frame = compose(
            &Projector::default(),
            &VisibilityPolicy::default(),
            &points,
            &SearchFilters::default(),
            ZoomState::default(),
            None,
            0.0,
        );
        assert!(frame.is_empty());
    }

    #[test]
    fn presenter_snaps_then_eases() {
        let points = [poi("a", 100.0, 90.0, "")];
        let mut presenter = Presenter::default();
        let filters = SearchFilters::default();

        let first = presenter.frame(0.016, 90.0, &points, &filters, ZoomState::default(), Some(ORIGIN));
        assert_eq!(first.heading_deg, 90.0);
        assert_eq!(first.emphasized().count(), 1);

        let next = presenter.frame(0.016, 120.0, &points, &filters, ZoomState::default(), Some(ORIGIN));
        assert!(next.heading_deg > 90.0 && next.heading_deg < 120.0);
        assert_eq!(presenter.displayed_heading(), next.heading_deg);
    }

    #[test]
    fn tap_only_hits_drawn_panels() {
        let points = [poi("ahead", 100.0, 0.0, ""), poi("behind", 100.0, 180.0, "")];
        let frame = frame_at(&points, 0.0);
        let mut selection = Selection::default();

        assert!(!selection.tap("behind", &frame));
        assert_eq!(selection.selected_id(), None);

        assert!(selection.tap("ahead", &frame));
        assert_eq!(selection.resolve(&points).map(|p| p.id.as_str()), Some("ahead"));

        // Result set replaced: the old selection no longer resolves.
        let refreshed = [poi("other", 50.0, 0.0, "")];
        assert!(selection.resolve(&refreshed).is_none());

        selection.clear();
        assert!(selection.resolve(&points).is_none());
    }
}
