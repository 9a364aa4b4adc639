//! Pinch-zoom gesture state.
//!
//! The committed magnification persists across frames. A gesture captures
//! it as a baseline when it begins; every update is `baseline + delta`
//! (never accumulated frame over frame), and the result becomes the new
//! committed value only when the gesture ends. Cancelling restores the
//! committed value.

use arlens_types::ZoomState;

/// Bounds applied to every gesture result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl ZoomLimits {
    fn clamp(&self, magnification: f64) -> ZoomState {
        let min = self.min.max(1.0);
        let max = self.max.max(min);
        if magnification.is_finite() {
            ZoomState::new(magnification.clamp(min, max))
        } else {
            ZoomState::new(min)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoomGesture {
    limits: ZoomLimits,
    committed: ZoomState,
    baseline: Option<f64>,
    live: ZoomState,
}

impl ZoomGesture {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// The magnification to render with this frame.
    pub fn current(&self) -> ZoomState {
        self.live
    }

    /// The magnification committed by the last completed gesture.
    pub fn committed(&self) -> ZoomState {
        self.committed
    }

    pub fn in_progress(&self) -> bool {
        self.baseline.is_some()
    }

    /// Capture the committed magnification as the gesture baseline.
    pub fn begin(&mut self) {
        self.baseline = Some(self.committed.magnification());
    }

    /// Apply a pinch delta relative to the baseline. Starts a gesture
    /// implicitly if none is in progress. Non-finite deltas are ignored.
    pub fn update(&mut self, delta: f64) -> ZoomState {
        if !delta.is_finite() {
            return self.live;
        }
        let baseline = *self
            .baseline
            .get_or_insert(self.committed.magnification());
        self.live = self.limits.clamp(baseline + delta);
        self.live
    }

    /// Commit the live magnification as the new baseline.
    pub fn end(&mut self) -> ZoomState {
        self.baseline = None;
        self.committed = self.live;
        self.committed
    }

    /// Abandon the gesture and restore the committed magnification.
    pub fn cancel(&mut self) -> ZoomState {
        self.baseline = None;
        self.live = self.committed;
        self.live
    }

    /// Jump straight to `magnification` (clamped) outside of any gesture.
    pub fn set(&mut self, magnification: f64) -> ZoomState {
        self.baseline = None;
        self.committed = self.limits.clamp(magnification);
        self.live = self.committed;
        self.live
    }
}
