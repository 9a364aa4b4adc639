//! Simulated sensors for headless runs and CI without a phone.
//!
//! Each driver samples a shared [`Scenario`] on its own fixed period, the way
//! the real platform streams arrive at independent rates:
//!
//! | Driver | Period | Extra behaviour |
//! |---|---|---|
//! | [`SimCompass`] | 100 ms | true + magnetic heading, sinusoidal jitter |
//! | [`SimGyro`] | 16 ms | cumulative yaw with bias drift, pitch |
//! | [`SimGps`] | 1 s | only reports after moving ≥ 20 m |
//!
//! Simulated time is `tick × period`, not wall-clock time, so a slow CI host
//! sees the same readings as a fast one.
//!
//! # Example
//!
//! ```rust
//! use arlens_hal::{Scenario, SimRig};
//! use arlens_middleware::sensor_queue;
//! use tokio::sync::watch;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (publisher, mut queue) = sensor_queue(64);
//! let (stop, shutdown) = watch::channel(false);
//!
//! let handles = SimRig::new(Scenario::default())
//!     .with_compass()
//!     .spawn(publisher, shutdown)
//!     .await;
//!
//! assert!(queue.recv().await.is_some());
//! stop.send(true).unwrap();
//! for h in handles {
//!     h.await.unwrap().unwrap();
//! }
//! # }
//! ```

use std::time::Duration;

use arlens_middleware::SensorPublisher;
use arlens_types::{
    ArError, CompassSample, PositionFix, RotationSample, SensorEvent, SensorKind,
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::driver::SensorDriver;
use crate::scenario::Scenario;

/// Difference between magnetic and true north around Tokyo (deg, west).
const MAGNETIC_DECLINATION_DEG: f64 = 7.5;

const ALL_KINDS: [SensorKind; 3] = [
    SensorKind::Orientation,
    SensorKind::Rotation,
    SensorKind::Position,
];

// ────────────────────────────────────────────────────────────────────────────
// Shared tick loop
// ────────────────────────────────────────────────────────────────────────────

/// Announce `kind` available, then call `sample` once per `period` and
/// publish whatever it yields until shutdown or the queue closes.
async fn drive<F>(
    kind: SensorKind,
    period: Duration,
    publisher: SensorPublisher,
    mut shutdown: watch::Receiver<bool>,
    mut sample: F,
) -> Result<(), ArError>
where
    F: FnMut(f64) -> Option<SensorEvent> + Send,
{
    if publisher.set_available(kind, true).await.is_err() {
        return Ok(());
    }
    debug!(?kind, ?period, "simulated sensor started");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let t = tick as f64 * period.as_secs_f64();
        tick += 1;
        let Some(event) = sample(t) else { continue };

        match publisher.publish(event).await {
            Ok(()) => {}
            Err(ArError::Channel(_)) => {
                debug!(?kind, "sensor queue closed; driver stopping");
                break;
            }
            Err(e) => warn!(?kind, error = %e, "simulated sample dropped"),
        }
    }

    debug!(?kind, ticks = tick, "simulated sensor stopped");
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Compass
// ────────────────────────────────────────────────────────────────────────────

/// Absolute-orientation stream. Reports both a true and a magnetic heading.
pub struct SimCompass {
    scenario: Scenario,
    period: Duration,
    report_true_heading: bool,
}

impl SimCompass {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            period: Duration::from_millis(100),
            report_true_heading: true,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Simulate a device without a location fix, which cannot resolve true
    /// north and reports `None` for it.
    pub fn magnetic_only(mut self) -> Self {
        self.report_true_heading = false;
        self
    }

    /// The reading at simulated time `t`.
    pub fn sample_at(&self, t: f64) -> CompassSample {
        let true_heading = self.scenario.compass_at(t);
        CompassSample {
            true_heading_deg: self.report_true_heading.then_some(true_heading),
            magnetic_heading_deg: (true_heading + MAGNETIC_DECLINATION_DEG).rem_euclid(360.0),
        }
    }
}

#[async_trait]
impl SensorDriver for SimCompass {
    fn kind(&self) -> SensorKind {
        SensorKind::Orientation
    }

    async fn run(
        &mut self,
        publisher: SensorPublisher,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ArError> {
        let period = self.period;
        drive(self.kind(), period, publisher, shutdown, |t| {
            Some(SensorEvent::Compass(self.sample_at(t)))
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gyroscope
// ────────────────────────────────────────────────────────────────────────────

/// Relative-rotation stream at the reference 60 Hz.
pub struct SimGyro {
    scenario: Scenario,
    period: Duration,
}

impl SimGyro {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            period: Duration::from_millis(16),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn sample_at(&self, t: f64) -> RotationSample {
        RotationSample {
            cumulative_yaw_rad: self.scenario.gyro_yaw_rad_at(t),
            pitch_rad: self.scenario.pitch_rad_at(t),
        }
    }
}

#[async_trait]
impl SensorDriver for SimGyro {
    fn kind(&self) -> SensorKind {
        SensorKind::Rotation
    }

    async fn run(
        &mut self,
        publisher: SensorPublisher,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ArError> {
        let period = self.period;
        drive(self.kind(), period, publisher, shutdown, |t| {
            Some(SensorEvent::Rotation(self.sample_at(t)))
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GPS
// ────────────────────────────────────────────────────────────────────────────

/// Position stream. Like the platform's distance-triggered location updates,
/// a fix is only emitted once the device has moved `min_move_m` since the
/// last one (the first fix is always emitted).
pub struct SimGps {
    scenario: Scenario,
    period: Duration,
    min_move_m: f64,
    accuracy_m: f64,
    last_walked_m: Option<f64>,
}

impl SimGps {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            period: Duration::from_secs(1),
            min_move_m: 20.0,
            accuracy_m: 5.0,
            last_walked_m: None,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_min_move(mut self, metres: f64) -> Self {
        self.min_move_m = metres.max(0.0);
        self
    }

    /// The fix at simulated time `t`, or `None` if the device has not moved
    /// far enough since the previous fix.
    pub fn sample_at(&mut self, t: f64) -> Option<PositionFix> {
        let walked = self.scenario.walked_m(t);
        if self
            .last_walked_m
            .is_some_and(|last| walked - last < self.min_move_m)
        {
            return None;
        }
        self.last_walked_m = Some(walked);
        Some(PositionFix {
            point: self.scenario.position_at(t),
            accuracy_m: self.accuracy_m,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl SensorDriver for SimGps {
    fn kind(&self) -> SensorKind {
        SensorKind::Position
    }

    async fn run(
        &mut self,
        publisher: SensorPublisher,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ArError> {
        let period = self.period;
        drive(self.kind(), period, publisher, shutdown, |t| {
            self.sample_at(t).map(SensorEvent::Position)
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that spawns a set of simulated sensor drivers onto the Tokio
/// runtime, all feeding one sensor queue.
///
/// Streams that were not added are announced unavailable before any driver
/// starts, so the consumer enters degraded mode immediately.
pub struct SimRig {
    scenario: Scenario,
    drivers: Vec<Box<dyn SensorDriver>>,
}

impl SimRig {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            drivers: Vec::new(),
        }
    }

    /// Add a [`SimCompass`] with the default period.
    pub fn with_compass(self) -> Self {
        let driver = SimCompass::new(self.scenario);
        self.with_driver(Box::new(driver))
    }

    /// Add a [`SimGyro`] with the default period.
    pub fn with_gyro(self) -> Self {
        let driver = SimGyro::new(self.scenario);
        self.with_driver(Box::new(driver))
    }

    /// Add a [`SimGps`] with the default period and movement threshold.
    pub fn with_gps(self) -> Self {
        let driver = SimGps::new(self.scenario);
        self.with_driver(Box::new(driver))
    }

    /// Add all three simulated streams.
    pub fn with_all(self) -> Self {
        self.with_compass().with_gyro().with_gps()
    }

    /// Register any custom driver. Useful when a test needs a short period.
    pub fn with_driver(mut self, driver: Box<dyn SensorDriver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// The sensor kinds that will be driven.
    pub fn kinds(&self) -> Vec<SensorKind> {
        self.drivers.iter().map(|d| d.kind()).collect()
    }

    /// Announce missing streams, then spawn one task per driver.
    pub async fn spawn(
        self,
        publisher: SensorPublisher,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<Result<(), ArError>>> {
        let present = self.kinds();
        for kind in ALL_KINDS.into_iter().filter(|k| !present.contains(k)) {
            info!(?kind, "sensor not present; announcing unavailable");
            if let Err(e) = publisher.set_available(kind, false).await {
                warn!(?kind, error = %e, "could not announce missing sensor");
            }
        }

        self.drivers
            .into_iter()
            .map(|mut driver| {
                let publisher = publisher.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { driver.run(publisher, shutdown).await })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arlens_middleware::sensor_queue;
    use arlens_types::GeoPoint;

    fn walking(speed: f64) -> Scenario {
        Scenario {
            walk_speed_m_s: speed,
            ..Scenario::default()
        }
    }

    #[test]
    fn compass_reports_true_and_magnetic() {
        let compass = SimCompass::new(Scenario::stationary(GeoPoint::new(35.0, 139.0), 90.0));
        let sample = compass.sample_at(0.0);
        assert_eq!(sample.true_heading_deg, Some(90.0));
        assert!((sample.magnetic_heading_deg - 97.5).abs() < 1e-9);
        assert_eq!(sample.resolved_deg(), 90.0);

        let magnetic = SimCompass::new(Scenario::default()).magnetic_only();
        assert_eq!(magnetic.sample_at(1.0).true_heading_deg, None);
    }

    #[test]
    fn gyro_yaw_grows_with_time() {
        let gyro = SimGyro::new(Scenario::default());
        assert_eq!(gyro.sample_at(0.0).cumulative_yaw_rad, 0.0);
        assert!(gyro.sample_at(1.0).cumulative_yaw_rad > 0.0);
    }

    #[test]
    fn gps_only_reports_after_min_move() {
        let mut gps = SimGps::new(walking(5.0));
        assert!(gps.sample_at(0.0).is_some(), "first fix is always emitted");
        assert!(gps.sample_at(1.0).is_none(), "5 m is below the threshold");
        assert!(gps.sample_at(3.0).is_none(), "15 m is below the threshold");
        assert!(gps.sample_at(4.0).is_some(), "20 m reaches the threshold");
        assert!(gps.sample_at(5.0).is_none());
    }

    #[test]
    fn stationary_gps_reports_once() {
        let mut gps = SimGps::new(Scenario::stationary(GeoPoint::new(35.0, 139.0), 0.0));
        assert!(gps.sample_at(0.0).is_some());
        assert!((1..100).all(|t| gps.sample_at(t as f64).is_none()));
    }

    #[tokio::test]
    async fn rig_announces_missing_sensors_and_streams() -> Result<(), Box<dyn std::error::Error>> {
        let (publisher, mut queue) = sensor_queue(256);
        let (stop, shutdown) = watch::channel(false);

        let compass = SimCompass::new(Scenario::default()).with_period(Duration::from_millis(2));
        let handles = SimRig::new(Scenario::default())
            .with_driver(Box::new(compass))
            .spawn(publisher, shutdown)
            .await;

        assert_eq!(
            queue.recv().await,
            Some(SensorEvent::Availability {
                kind: SensorKind::Rotation,
                available: false
            })
        );
        assert_eq!(
            queue.recv().await,
            Some(SensorEvent::Availability {
                kind: SensorKind::Position,
                available: false
            })
        );
        assert_eq!(
            queue.recv().await,
            Some(SensorEvent::Availability {
                kind: SensorKind::Orientation,
                available: true
            })
        );
        assert!(matches!(queue.recv().await, Some(SensorEvent::Compass(_))));

        stop.send(true)?;
        for handle in handles {
            handle.await??;
        }
        Ok(())
    }

    #[tokio::test]
    async fn driver_stops_when_queue_closes() {
        let (publisher, queue) = sensor_queue(4);
        let (_stop, shutdown) = watch::channel(false);
        drop(queue);

        let mut gyro = SimGyro::new(Scenario::default()).with_period(Duration::from_millis(1));
        assert!(gyro.run(publisher, shutdown).await.is_ok());
    }

    #[test]
    fn rig_lists_kinds() {
        let rig = SimRig::new(Scenario::default()).with_all();
        assert_eq!(
            rig.kinds(),
            vec![SensorKind::Orientation, SensorKind::Rotation, SensorKind::Position]
        );
    }
}
