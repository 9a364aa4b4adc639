//! Heading Stabilizer.
//!
//! Produces one world heading suitable for driving animation directly from
//! two imperfect sources:
//!
//! - **Rotation** – the platform's integrated yaw (gyroscope-class); smooth
//!   frame to frame at ~60 Hz but drifting slowly and with an arbitrary zero.
//! - **Compass** – absolute heading; anchored to north but jittering by
//!   several degrees and occasionally flipping between true and magnetic.
//!
//! Two strategies implement the same contract (output always in `[0, 360)`,
//! shortest-arc wrapping in every difference, bounded convergence without
//! overshoot):
//!
//! - [`StabilizerStrategy::Complementary`] (default) follows the rotation
//!   signal directly and nudges a yaw offset toward the compass by a fixed
//!   fraction per rotation sample:
//!
//!   ```text
//!   predicted = yaw + offset
//!   offset   += gain * shortest(compass − predicted)
//!   heading   = normalize(yaw + offset)
//!   ```
//!
//!   With `gain = 0.01` at 60 Hz the compass pull has a ~1.6 s time constant.
//! - [`StabilizerStrategy::Deadzone`] ignores rotation for heading and
//!   exponentially smooths compass samples, discarding any sample within
//!   `deadzone_deg` of the current estimate. The runtime falls back to it
//!   when no rotation sensor is available.
//!
//! # Example
//!
//! ```rust
//! use arlens_perception::stabilizer::{HeadingStabilizer, StabilizerConfig};
//! use arlens_types::{CompassSample, RotationSample};
//!
//! let mut stab = HeadingStabilizer::new(StabilizerConfig::default());
//! stab.on_compass(&CompassSample { true_heading_deg: Some(90.0), magnetic_heading_deg: 88.0 })
//!     .unwrap();
//! assert!((stab.heading() - 90.0).abs() < 1e-9);
//!
//! // The first rotation sample is aligned to the current heading: no jump.
//! let h = stab
//!     .on_rotation(&RotationSample { cumulative_yaw_rad: 1.0, pitch_rad: 0.0 })
//!     .unwrap();
//! assert!((h - 90.0).abs() < 1e-9);
//! ```

use arlens_types::{ArError, CompassSample, Orientation, RotationSample, SensorKind};
use tracing::debug;

use crate::geodesy::{normalize_degrees, signed_delta};

/// Fraction of the compass error corrected per rotation sample.
pub const DEFAULT_CORRECTION_GAIN: f64 = 0.01;
/// Compass samples closer than this to the estimate are discarded (degrees).
pub const DEFAULT_DEADZONE_DEG: f64 = 0.5;
/// Fraction of the compass error applied per accepted compass sample.
pub const DEFAULT_SMOOTHING: f64 = 0.04;

/// Heading fusion strategy. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilizerStrategy {
    Complementary { correction_gain: f64 },
    Deadzone { deadzone_deg: f64, smoothing: f64 },
}

impl StabilizerStrategy {
    pub fn complementary() -> Self {
        StabilizerStrategy::Complementary {
            correction_gain: DEFAULT_CORRECTION_GAIN,
        }
    }

    pub fn deadzone() -> Self {
        StabilizerStrategy::Deadzone {
            deadzone_deg: DEFAULT_DEADZONE_DEG,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    /// Clamp gains into `[0, 1]` and the deadzone to `>= 0`. Non-finite
    /// parameters fall back to the defaults.
    fn sanitized(self) -> Self {
        fn unit(v: f64, fallback: f64) -> f64 {
            if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback }
        }
        match self {
            StabilizerStrategy::Complementary { correction_gain } => {
                StabilizerStrategy::Complementary {
                    correction_gain: unit(correction_gain, DEFAULT_CORRECTION_GAIN),
                }
            }
            StabilizerStrategy::Deadzone {
                deadzone_deg,
                smoothing,
            } => StabilizerStrategy::Deadzone {
                deadzone_deg: if deadzone_deg.is_finite() {
                    deadzone_deg.max(0.0)
                } else {
                    DEFAULT_DEADZONE_DEG
                },
                smoothing: unit(smoothing, DEFAULT_SMOOTHING),
            },
        }
    }
}

impl Default for StabilizerStrategy {
    fn default() -> Self {
        Self::complementary()
    }
}

/// Construction parameters for [`HeadingStabilizer`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StabilizerConfig {
    pub strategy: StabilizerStrategy,
}

/// Stateful heading filter. Single writer: the runtime feeds it from one
/// task consuming the ordered sensor queue.
#[derive(Debug, Clone)]
pub struct HeadingStabilizer {
    strategy: StabilizerStrategy,
    internal_heading: f64,
    last_compass_heading: Option<f64>,
    /// `internal_heading − yaw`, wrapped to `(-180, 180]`.
    yaw_offset: f64,
    /// `false` until a rotation sample has aligned `yaw_offset`.
    yaw_aligned: bool,
    pitch_deg: Option<f64>,
}

impl HeadingStabilizer {
    /// Create a stabilizer. The heading starts at `0.0` (north) until the
    /// first compass sample seeds it.
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            strategy: config.strategy.sanitized(),
            internal_heading: 0.0,
            last_compass_heading: None,
            yaw_offset: 0.0,
            yaw_aligned: false,
            pitch_deg: None,
        }
    }

    /// The active strategy.
    pub fn strategy(&self) -> StabilizerStrategy {
        self.strategy
    }

    /// Switch strategy without disturbing the current heading.
    ///
    /// Switching to [`StabilizerStrategy::Complementary`] re-aligns the yaw
    /// offset on the next rotation sample.
    pub fn set_strategy(&mut self, strategy: StabilizerStrategy) {
        self.strategy = strategy.sanitized();
        self.yaw_aligned = false;
        debug!(strategy = ?self.strategy, heading = self.internal_heading, "stabilizer strategy changed");
    }

    /// Current stabilized heading in `[0, 360)`.
    pub fn heading(&self) -> f64 {
        self.internal_heading
    }

    /// Most recent pitch in degrees, if any rotation sample has arrived.
    pub fn pitch_deg(&self) -> Option<f64> {
        self.pitch_deg
    }

    /// Most recent resolved compass heading.
    pub fn last_compass_heading(&self) -> Option<f64> {
        self.last_compass_heading
    }

    pub fn orientation(&self) -> Orientation {
        Orientation {
            heading_deg: self.internal_heading,
            pitch_deg: self.pitch_deg,
        }
    }

    /// Feed a compass sample and return the resulting heading.
    ///
    /// # Errors
    ///
    /// Returns [`ArError::InvalidSample`] for a non-finite heading; the
    /// filter state is left untouched.
    pub fn on_compass(&mut self, sample: &CompassSample) -> Result<f64, ArError> {
        let raw = sample.resolved_deg();
        if !raw.is_finite() {
            return Err(ArError::InvalidSample {
                stream: SensorKind::Orientation,
                reason: format!("non-finite compass heading {raw}"),
            });
        }
        let compass = normalize_degrees(raw);
        let first = self.last_compass_heading.is_none();
        self.last_compass_heading = Some(compass);

        match self.strategy {
            StabilizerStrategy::Complementary { .. } => {
                // Without rotation data there is nothing to follow yet.
                if first && !self.yaw_aligned {
                    self.internal_heading = compass;
                }
            }
            StabilizerStrategy::Deadzone {
                deadzone_deg,
                smoothing,
            } => {
                if first {
                    self.internal_heading = compass;
                } else {
                    let diff = signed_delta(self.internal_heading, compass);
                    if diff.abs() >= deadzone_deg {
                        self.internal_heading =
                            normalize_degrees(self.internal_heading + diff * smoothing);
                    }
                }
            }
        }
        Ok(self.internal_heading)
    }

    /// Feed a rotation sample and return the resulting heading.
    ///
    /// # Errors
    ///
    /// Returns [`ArError::InvalidSample`] when yaw or pitch is non-finite;
    /// the filter state is left untouched.
    pub fn on_rotation(&mut self, sample: &RotationSample) -> Result<f64, ArError> {
        if !sample.cumulative_yaw_rad.is_finite() || !sample.pitch_rad.is_finite() {
            return Err(ArError::InvalidSample {
                stream: SensorKind::Rotation,
                reason: format!(
                    "non-finite rotation (yaw {}, pitch {})",
                    sample.cumulative_yaw_rad, sample.pitch_rad
                ),
            });
        }
        self.pitch_deg = Some(sample.pitch_rad.to_degrees());

        let StabilizerStrategy::Complementary { correction_gain } = self.strategy else {
            return Ok(self.internal_heading);
        };

        let yaw = normalize_degrees(sample.cumulative_yaw_rad.to_degrees());
        if !self.yaw_aligned {
            self.yaw_offset = signed_delta(yaw, self.internal_heading);
            self.yaw_aligned = true;
        }

        if let Some(compass) = self.last_compass_heading {
            let predicted = normalize_degrees(yaw + self.yaw_offset);
            let drift = signed_delta(predicted, compass);
            self.yaw_offset = signed_delta(0.0, self.yaw_offset + drift * correction_gain);
        }

        self.internal_heading = normalize_degrees(yaw + self.yaw_offset);
        Ok(self.internal_heading)
    }
}

impl Default for HeadingStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}
