//! `arlens-runtime` – orchestration around the perception core.
//!
//! # Modules
//!
//! - [`engine`] – [`StabilizerTask`][engine::StabilizerTask]: the single
//!   consumer of the sensor queue that owns the heading filter, and the
//!   [`WorldHandle`][engine::WorldHandle] read side polled every frame
//!   (`stabilized_heading`, `current_pitch`, `position`).
//! - [`provider`] – the [`PoiProvider`][provider::PoiProvider] trait with a
//!   static JSON dataset and a gourmet-search HTTP client.
//! - [`fetch`] – [`FetchCoordinator`][fetch::FetchCoordinator]: sequenced
//!   refreshes so a late response never overwrites a newer one, and
//!   failures resolve to an empty set.
//! - [`zoom`] – [`ZoomGesture`][zoom::ZoomGesture]: baseline-relative pinch
//!   zoom committed at gesture end.
//! - [`overlay`] – per-frame composition into an
//!   [`OverlayFrame`][overlay::OverlayFrame], presentation smoothing, and tap
//!   selection.
//! - [`session`] – [`Session`][session::Session]: wires drivers, stabilizer,
//!   fetcher and presenter into one running world.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging with optional OTLP span export.

pub mod engine;
pub mod fetch;
pub mod overlay;
pub mod provider;
pub mod session;
pub mod telemetry;
pub mod zoom;

pub use engine::{SensorAvailability, StabilizerTask, WorldConfig, WorldHandle, spawn_world};
pub use fetch::{FetchCoordinator, FetchOutcome, PoiSet};
pub use overlay::{OverlayFrame, Presenter, RenderedPanel, Selection, compose};
pub use provider::{
    HttpPoiProvider, PoiProvider, PoiQuery, ProviderError, SearchRange, StaticPoiProvider,
};
pub use session::{Session, SessionConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use zoom::{ZoomGesture, ZoomLimits};
