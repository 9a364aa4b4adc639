//! `arlens-hal` – sensor sources.
//!
//! Platform sensors are reached only through the [`SensorDriver`] trait so the
//! rest of the pipeline never knows whether samples come from a phone's
//! compass, a recorded trace, or a simulation.
//!
//! # Modules
//!
//! - [`driver`] – the [`SensorDriver`] trait.
//! - [`scenario`] – [`Scenario`]: a deterministic walk-and-turn script that
//!   answers "what would the device read at time `t`".
//! - [`sim`] – simulated compass, gyroscope and GPS drivers plus the
//!   [`SimRig`] builder that spawns them for headless runs and CI.

pub mod driver;
pub mod scenario;
pub mod sim;

pub use driver::SensorDriver;
pub use scenario::Scenario;
pub use sim::{SimCompass, SimGps, SimGyro, SimRig};
