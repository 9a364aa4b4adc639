//! `arlens-perception` – sensor fusion and AR projection.
//!
//! Turns noisy compass / gyroscope / GPS readings into a stable on-screen
//! position for every nearby point of interest.
//!
//! # Modules
//!
//! - [`geodesy`] – great-circle distance, initial bearing, angle wrapping
//!   and the best-effort floor-level heuristic.
//! - [`stabilizer`] – [`HeadingStabilizer`][stabilizer::HeadingStabilizer]:
//!   fuses rotation-rate integration with absolute compass readings into one
//!   smoothed world heading.
//! - [`spring`] – [`AngularSpring`][spring::AngularSpring]: critically-damped
//!   presentation smoothing applied by the render loop on top of the
//!   stabilizer.
//! - [`projector`] – [`Projector`][projector::Projector]: pure mapping from
//!   bearing, heading, zoom and distance to a
//!   [`ProjectedPanel`][arlens_types::ProjectedPanel].
//! - [`visibility`] – [`VisibilityPolicy`][visibility::VisibilityPolicy]:
//!   search-filter, rating and zoom-based suppression before projection,
//!   plus identifier lookup for the detail view.

pub mod geodesy;
pub mod projector;
pub mod spring;
pub mod stabilizer;
pub mod visibility;

pub use projector::{DistanceStage, Framing, Projector, ProjectorConfig};
pub use spring::{AngularSpring, SpringConfig};
pub use stabilizer::{HeadingStabilizer, StabilizerConfig, StabilizerStrategy};
pub use visibility::{Candidate, VisibilityPolicy};
