//! `arlens-types` – shared data model for the AR overlay pipeline.
//!
//! Every other crate in the workspace speaks in these types: geographic
//! points, points of interest, sensor samples, projected panels, search
//! filters, bus events and the global [`ArError`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Geography
// ────────────────────────────────────────────────────────────────────────────

/// A WGS-84 coordinate in degrees. No datum correction is applied anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `true` when both components are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A restaurant (or any other venue) that can be shown as a floating panel.
///
/// Immutable for its lifetime in a result set; a re-fetch replaces the whole
/// set rather than patching individual entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// Stable identifier, unique within a result set.
    pub id: String,
    pub position: GeoPoint,
    pub name: String,
    /// Category label, compared by exact match against [`GENRES`].
    pub genre: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub thumbnail: String,
    /// Free-text address; the floor level is derived from it heuristically.
    #[serde(default)]
    pub address: String,
    /// `None` when the data source does not know the opening state.
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default)]
    pub catch_copy: String,
    #[serde(default)]
    pub open_hours: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Angles
// ────────────────────────────────────────────────────────────────────────────

/// Wrap any finite angle into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round a tiny negative input up to exactly 360.0.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest signed rotation that takes `from` onto `to`, in `(-180, 180]`.
///
/// Positive values are clockwise. `signed_delta(350.0, 10.0) == 20.0`.
pub fn signed_delta(from: f64, to: f64) -> f64 {
    let d = normalize_degrees(to - from);
    if d > 180.0 { d - 360.0 } else { d }
}

// ────────────────────────────────────────────────────────────────────────────
// Orientation / zoom / projection output
// ────────────────────────────────────────────────────────────────────────────

/// Device orientation as published by the heading stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Always in `[0, 360)`.
    pub heading_deg: f64,
    /// `None` until the rotation sensor has delivered a sample.
    pub pitch_deg: Option<f64>,
}

/// Zoom magnification derived from a pinch gesture. Never below `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    magnification: f64,
}

impl ZoomState {
    /// Build a zoom state, clamping to `>= 1.0`. Non-finite input yields `1.0`.
    pub fn new(magnification: f64) -> Self {
        let magnification = if magnification.is_finite() {
            magnification.max(1.0)
        } else {
            1.0
        };
        Self { magnification }
    }

    pub fn magnification(&self) -> f64 {
        self.magnification
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self { magnification: 1.0 }
    }
}

/// Render parameters for one panel in one frame. Recomputed every tick and
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPanel {
    /// Horizontal offset from the viewport centre, in percent of its width.
    pub screen_x: f64,
    /// Vertical offset from the viewport centre, in percent of its height.
    pub screen_y: f64,
    pub scale: f64,
    pub opacity: f64,
    pub z_index: u32,
    pub emphasized: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor samples
// ────────────────────────────────────────────────────────────────────────────

/// The three independent input streams feeding the world model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Compass-class absolute heading.
    Orientation,
    /// Gyroscope-class relative rotation at a fixed rate.
    Rotation,
    /// GPS-class position fixes.
    Position,
}

/// A GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub point: GeoPoint,
    /// Horizontal accuracy radius (metres).
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

/// A compass reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompassSample {
    /// True-north heading; `None` when the platform could not compute it.
    pub true_heading_deg: Option<f64>,
    pub magnetic_heading_deg: f64,
}

impl CompassSample {
    /// The heading to fuse: true heading when available and non-negative,
    /// magnetic heading otherwise.
    pub fn resolved_deg(&self) -> f64 {
        match self.true_heading_deg {
            Some(h) if h >= 0.0 => h,
            _ => self.magnetic_heading_deg,
        }
    }
}

/// A device-motion reading. Yaw is the platform's integrated rotation
/// around the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationSample {
    pub cumulative_yaw_rad: f64,
    pub pitch_rad: f64,
}

/// An immutable event on the ordered sensor queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensorEvent {
    Compass(CompassSample),
    Rotation(RotationSample),
    Position(PositionFix),
    /// Permission granted/denied or hardware presence changed.
    Availability { kind: SensorKind, available: bool },
}

impl SensorEvent {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorEvent::Compass(_) => SensorKind::Orientation,
            SensorEvent::Rotation(_) => SensorKind::Rotation,
            SensorEvent::Position(_) => SensorKind::Position,
            SensorEvent::Availability { kind, .. } => *kind,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Search filters
// ────────────────────────────────────────────────────────────────────────────

/// Sentinel genre meaning "no category filter".
pub const GENRE_ALL: &str = "すべて";

/// The fixed set of selectable genres, sentinel first.
pub const GENRES: [&str; 9] = [
    GENRE_ALL,
    "和食",
    "洋食",
    "中華",
    "カフェ",
    "居酒屋",
    "ラーメン",
    "イタリアン・フレンチ",
    "焼肉・ホルモン",
];

/// Selectable search radii (metres).
pub const RADIUS_CHOICES: [f64; 4] = [300.0, 500.0, 1000.0, 3000.0];

/// Selectable result-count caps.
pub const LIMIT_CHOICES: [usize; 4] = [10, 30, 50, 100];

/// Category filter. Serialized as the plain genre label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GenreFilter {
    #[default]
    All,
    Exact(String),
}

impl GenreFilter {
    /// Parse a label from the fixed genre set.
    ///
    /// # Errors
    ///
    /// Returns [`ArError::Config`] for labels outside [`GENRES`].
    pub fn parse(label: &str) -> Result<Self, ArError> {
        if label == GENRE_ALL {
            Ok(GenreFilter::All)
        } else if GENRES.contains(&label) {
            Ok(GenreFilter::Exact(label.to_string()))
        } else {
            Err(ArError::Config(format!("unknown genre: {label}")))
        }
    }

    /// Case-sensitive exact match; [`GenreFilter::All`] matches everything.
    pub fn matches(&self, genre: &str) -> bool {
        match self {
            GenreFilter::All => true,
            GenreFilter::Exact(g) => g == genre,
        }
    }

    /// The keyword to send to a search provider, if any.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            GenreFilter::All => None,
            GenreFilter::Exact(g) => Some(g),
        }
    }
}

impl TryFrom<String> for GenreFilter {
    type Error = ArError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GenreFilter::parse(&value)
    }
}

impl From<GenreFilter> for String {
    fn from(value: GenreFilter) -> Self {
        match value {
            GenreFilter::All => GENRE_ALL.to_string(),
            GenreFilter::Exact(g) => g,
        }
    }
}

/// User-selected search filters.
///
/// Missing fields deserialize to their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub genre: GenreFilter,
    /// Search radius (metres).
    pub radius_m: f64,
    /// Hide venues known to be closed.
    pub only_open: bool,
    /// Minimum rating for rated venues; `None` disables the threshold.
    pub min_rating: Option<f32>,
    /// Whether venues without any rating are shown.
    pub include_unrated: bool,
    /// Maximum number of venues kept after filtering.
    pub limit: usize,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            genre: GenreFilter::All,
            radius_m: 1000.0,
            only_open: true,
            min_rating: None,
            include_unrated: true,
            limit: 30,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "arlens-runtime::fetch"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A new stabilized orientation.
    Orientation(Orientation),
    /// A new position fix was accepted.
    Position(GeoPoint),
    /// A point-of-interest result set replaced the previous one.
    PointsOfInterest { sequence: u64, count: usize },
    /// A sensor became available or unavailable.
    SensorStatus { kind: SensorKind, available: bool },
    /// Operator-visible alert (shutdown, provider failure).
    Alert { component: String, message: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning sensor validation, data providers, channels
/// and configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArError {
    #[error("Invalid {stream:?} sample: {reason}")]
    InvalidSample { stream: SensorKind, reason: String },

    #[error("Sensor unavailable: {0:?}")]
    SensorUnavailable(SensorKind),

    #[error("Point-of-interest provider error: {0}")]
    Provider(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
