//! Critically-damped angular spring for presentation smoothing.
//!
//! The stabilizer already removes sensor jitter, but it only moves when a
//! sample arrives. The render loop runs at its own rate and eases the
//! displayed heading toward the latest stabilized value with this spring so
//! panels glide instead of stepping.
//!
//! The spring is integrated with the closed-form critically-damped solution,
//! so it is stable for any frame time:
//!
//! ```text
//! e(t) = (e0 + (v0 + ω·e0)·t) · exp(−ω·t)
//! ```
//!
//! where `e` is the shortest-arc error to the target.
//!
//! # Example
//!
//! ```rust
//! use arlens_perception::spring::{AngularSpring, SpringConfig};
//!
//! let mut spring = AngularSpring::new(SpringConfig::default(), 350.0);
//! spring.set_target(10.0);
//!
//! let shown = spring.update(1.0 / 60.0);
//! // Moves clockwise through north, never the long way round.
//! assert!(shown > 350.0 || shown < 10.0);
//! ```

use crate::geodesy::{normalize_degrees, signed_delta};

/// Default natural frequency (rad/s). Settles within ~0.4 s.
pub const DEFAULT_OMEGA: f64 = 12.0;

/// Tuning for [`AngularSpring`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    /// Natural frequency ω (rad/s). Higher is stiffer.
    pub omega: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            omega: DEFAULT_OMEGA,
        }
    }
}

/// Eases an angle (degrees) toward a moving target without overshoot.
#[derive(Debug, Clone)]
pub struct AngularSpring {
    omega: f64,
    value: f64,
    velocity: f64,
    target: f64,
}

impl AngularSpring {
    /// Create a spring resting at `initial` degrees.
    ///
    /// A non-positive or non-finite `omega` falls back to [`DEFAULT_OMEGA`].
    pub fn new(config: SpringConfig, initial: f64) -> Self {
        let omega = if config.omega.is_finite() && config.omega > 0.0 {
            config.omega
        } else {
            DEFAULT_OMEGA
        };
        let initial = if initial.is_finite() {
            normalize_degrees(initial)
        } else {
            0.0
        };
        Self {
            omega,
            value: initial,
            velocity: 0.0,
            target: initial,
        }
    }

    /// Change the target angle. Non-finite targets are ignored.
    pub fn set_target(&mut self, target: f64) {
        if target.is_finite() {
            self.target = normalize_degrees(target);
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// The currently displayed angle in `[0, 360)`.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Advance the spring by `dt` seconds and return the displayed angle.
    ///
    /// Returns the current value unchanged if `dt` is not positive.
    pub fn update(&mut self, dt: f64) -> f64 {
        if !dt.is_finite() || dt <= 0.0 {
            return self.value;
        }
        let w = self.omega;
        // Error measured from target to value along the short arc.
        let e0 = signed_delta(self.target, self.value);
        let v0 = self.velocity;
        let c = v0 + w * e0;
        let decay = (-w * dt).exp();

        let e = (e0 + c * dt) * decay;
        self.velocity = (v0 - w * c * dt) * decay;
        self.value = normalize_degrees(self.target + e);
        self.value
    }

    /// Jump straight to `value` and stop.
    pub fn reset(&mut self, value: f64) {
        if value.is_finite() {
            self.value = normalize_degrees(value);
            self.target = self.value;
            self.velocity = 0.0;
        }
    }
}
