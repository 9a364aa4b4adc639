//! [`StabilizerTask`] – the single consumer of the sensor queue.
//!
//! Every compass, rotation, position and availability sample funnels through
//! one [`SensorQueue`]. This task owns the [`HeadingStabilizer`] outright and
//! applies samples one at a time in arrival order, so the filter state needs
//! no lock. Results leave the task two ways:
//!
//! - `watch` channels holding the latest orientation, position and sensor
//!   availability, read through a cloneable [`WorldHandle`] by the render
//!   loop each frame;
//! - [`EventBus`] events on the `Orientation`, `World` and `SensorStatus`
//!   topics for anything that wants a change feed.
//!
//! # Degraded mode
//!
//! When the rotation stream reports unavailable the task switches the
//! stabilizer to [`StabilizerStrategy::Deadzone`] so the heading still
//! follows the compass; when rotation returns, the configured strategy is
//! restored. A position stream reporting unavailable clears the current
//! position, which empties the visible set downstream.
//!
//! # Example
//!
//! ```rust
//! use arlens_middleware::{EventBus, sensor_queue};
//! use arlens_runtime::engine::{WorldConfig, spawn_world};
//! use arlens_types::{CompassSample, SensorEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (publisher, queue) = sensor_queue(64);
//! let (task, world) = spawn_world(WorldConfig::default(), queue, EventBus::default());
//! let handle = tokio::spawn(task.run());
//!
//! let sample = CompassSample { true_heading_deg: Some(120.0), magnetic_heading_deg: 127.5 };
//! publisher.publish(SensorEvent::Compass(sample)).await.unwrap();
//! drop(publisher);
//! handle.await.unwrap();
//!
//! assert!((world.stabilized_heading() - 120.0).abs() < 1e-9);
//! # }
//! ```

use arlens_middleware::{EventBus, SensorQueue, Topic};
use arlens_perception::{HeadingStabilizer, StabilizerConfig, StabilizerStrategy};
use arlens_types::{
    ArError, Event, EventPayload, GeoPoint, Orientation, PositionFix, SensorEvent, SensorKind,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SOURCE: &str = "arlens-runtime::engine";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`StabilizerTask`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Strategy used while the rotation stream is available.
    pub stabilizer: StabilizerConfig,
    /// Switch to compass-only smoothing while rotation is unavailable.
    pub fallback_without_rotation: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            stabilizer: StabilizerConfig::default(),
            fallback_without_rotation: true,
        }
    }
}

/// Last reported availability of each sensor stream. Every stream starts
/// unavailable until its driver announces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorAvailability {
    pub orientation: bool,
    pub rotation: bool,
    pub position: bool,
}

impl SensorAvailability {
    pub fn get(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Orientation => self.orientation,
            SensorKind::Rotation => self.rotation,
            SensorKind::Position => self.position,
        }
    }

    fn set(&mut self, kind: SensorKind, available: bool) {
        match kind {
            SensorKind::Orientation => self.orientation = available,
            SensorKind::Rotation => self.rotation = available,
            SensorKind::Position => self.position = available,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────────

/// Build the stabilizer task and the read handle bound to it.
///
/// The task does nothing until [`StabilizerTask::run`] is awaited (usually
/// inside `tokio::spawn`).
pub fn spawn_world(
    config: WorldConfig,
    queue: SensorQueue,
    bus: EventBus,
) -> (StabilizerTask, WorldHandle) {
    let (orientation_tx, orientation_rx) = watch::channel(Orientation::default());
    let (position_tx, position_rx) = watch::channel(None);
    let (status_tx, status_rx) = watch::channel(SensorAvailability::default());

    let task = StabilizerTask {
        stabilizer: HeadingStabilizer::new(config.stabilizer),
        configured: config.stabilizer.strategy,
        fallback_without_rotation: config.fallback_without_rotation,
        queue,
        bus,
        orientation_tx,
        position_tx,
        status_tx,
        accepted: 0,
        rejected: 0,
    };
    let handle = WorldHandle {
        orientation: orientation_rx,
        position: position_rx,
        status: status_rx,
    };
    (task, handle)
}

// ─────────────────────────────────────────────────────────────────────────────
// StabilizerTask
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the heading filter and applies queued samples strictly in order.
pub struct StabilizerTask {
    stabilizer: HeadingStabilizer,
    configured: StabilizerStrategy,
    fallback_without_rotation: bool,
    queue: SensorQueue,
    bus: EventBus,
    orientation_tx: watch::Sender<Orientation>,
    position_tx: watch::Sender<Option<GeoPoint>>,
    status_tx: watch::Sender<SensorAvailability>,
    accepted: u64,
    rejected: u64,
}

impl StabilizerTask {
    /// Drain the queue until every publisher is gone, then return the final
    /// filter state.
    pub async fn run(mut self) -> HeadingStabilizer {
        info!(strategy = ?self.stabilizer.strategy(), "stabilizer task started");
        while let Some(event) = self.queue.recv().await {
            self.apply(event);
        }
        info!(
            accepted = self.accepted,
            rejected = self.rejected,
            heading = self.stabilizer.heading(),
            "sensor queue drained; stabilizer task stopped"
        );
        self.stabilizer
    }

    /// Apply a single sample. Invalid samples are logged and skipped; they
    /// never touch the filter state.
    pub fn apply(&mut self, event: SensorEvent) {
        let result = match event {
            SensorEvent::Compass(sample) => self.stabilizer.on_compass(&sample).map(|_| ()),
            SensorEvent::Rotation(sample) => self.stabilizer.on_rotation(&sample).map(|_| ()),
            SensorEvent::Position(fix) => self.on_position(fix),
            SensorEvent::Availability { kind, available } => {
                self.on_availability(kind, available);
                return;
            }
        };

        match result {
            Ok(()) => {
                self.accepted += 1;
                if matches!(event, SensorEvent::Compass(_) | SensorEvent::Rotation(_)) {
                    self.publish_orientation();
                }
            }
            Err(e) => {
                self.rejected += 1;
                warn!(stream = ?event.kind(), error = %e, "sample rejected by stabilizer");
            }
        }
    }

    pub fn stabilizer(&self) -> &HeadingStabilizer {
        &self.stabilizer
    }

    fn on_position(&mut self, fix: PositionFix) -> Result<(), ArError> {
        if !fix.point.is_valid() {
            return Err(ArError::InvalidSample {
                stream: SensorKind::Position,
                reason: format!("coordinate {:?} out of range", fix.point),
            });
        }
        debug!(
            lat = fix.point.latitude,
            lng = fix.point.longitude,
            accuracy_m = fix.accuracy_m,
            "position fix accepted"
        );
        self.position_tx.send_replace(Some(fix.point));
        self.publish(Topic::World, EventPayload::Position(fix.point));
        Ok(())
    }

    fn on_availability(&mut self, kind: SensorKind, available: bool) {
        let changed = self.status_tx.send_if_modified(|status| {
            let before = status.get(kind);
            status.set(kind, available);
            before != available
        });
        info!(?kind, available, "sensor availability");

        if kind == SensorKind::Rotation && self.fallback_without_rotation {
            let wanted = if available {
                self.configured
            } else {
                StabilizerStrategy::deadzone()
            };
            if self.stabilizer.strategy() != wanted {
                info!(strategy = ?wanted, "switching stabilizer strategy");
                self.stabilizer.set_strategy(wanted);
            }
        }
        if kind == SensorKind::Position && !available {
            self.position_tx.send_replace(None);
        }
        if changed {
            self.publish(
                Topic::SensorStatus,
                EventPayload::SensorStatus { kind, available },
            );
        }
    }

    fn publish_orientation(&self) {
        let orientation = self.stabilizer.orientation();
        self.orientation_tx.send_replace(orientation);
        self.publish(Topic::Orientation, EventPayload::Orientation(orientation));
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            debug!(?topic, error = %e, "bus publish failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorldHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Cheap, cloneable read side of the world state. Safe to poll every frame.
#[derive(Debug, Clone)]
pub struct WorldHandle {
    orientation: watch::Receiver<Orientation>,
    position: watch::Receiver<Option<GeoPoint>>,
    status: watch::Receiver<SensorAvailability>,
}

impl WorldHandle {
    /// Latest stabilized heading in `[0, 360)`. `0.0` until a sample arrives.
    pub fn stabilized_heading(&self) -> f64 {
        self.orientation.borrow().heading_deg
    }

    /// Latest pitch in degrees, `0.0` while no rotation sample has arrived.
    pub fn current_pitch(&self) -> f64 {
        self.orientation.borrow().pitch_deg.unwrap_or(0.0)
    }

    pub fn orientation(&self) -> Orientation {
        *self.orientation.borrow()
    }

    /// Latest accepted position, `None` before the first fix or while the
    /// position stream is unavailable.
    pub fn position(&self) -> Option<GeoPoint> {
        *self.position.borrow()
    }

    pub fn availability(&self) -> SensorAvailability {
        *self.status.borrow()
    }

    /// A receiver that wakes on every position change. Used to trigger
    /// point-of-interest refreshes.
    pub fn watch_position(&self) -> watch::Receiver<Option<GeoPoint>> {
        self.position.clone()
    }

    /// A receiver that wakes on every orientation change.
    pub fn watch_orientation(&self) -> watch::Receiver<Orientation> {
        self.orientation.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arlens_middleware::sensor_queue;
    use arlens_types::{CompassSample, RotationSample};
    use chrono::Utc;

    fn compass(deg: f64) -> SensorEvent {
        SensorEvent::Compass(CompassSample {
            true_heading_deg: Some(deg),
            magnetic_heading_deg: deg,
        })
    }

    fn rotation(yaw_deg: f64) -> SensorEvent {
        SensorEvent::Rotation(RotationSample {
            cumulative_yaw_rad: yaw_deg.to_radians(),
            pitch_rad: 10f64.to_radians(),
        })
    }

    fn availability(kind: SensorKind, available: bool) -> SensorEvent {
        SensorEvent::Availability { kind, available }
    }

    fn world() -> (StabilizerTask, WorldHandle, EventBus) {
        let (_publisher, queue) = sensor_queue(8);
        let bus = EventBus::default();
        let (task, handle) = spawn_world(WorldConfig::default(), queue, bus.clone());
        (task, handle, bus)
    }

    #[test]
    fn degraded_defaults() {
        let (_task, handle, _bus) = world();
        assert_eq!(handle.stabilized_heading(), 0.0);
        assert_eq!(handle.current_pitch(), 0.0);
        assert_eq!(handle.position(), None);
        assert_eq!(handle.availability(), SensorAvailability::default());
    }

    #[test]
    fn compass_and_rotation_update_handle() {
        let (mut task, handle, _bus) = world();
        task.apply(compass(45.0));
        assert!((handle.stabilized_heading() - 45.0).abs() < 1e-9);

        task.apply(rotation(0.0));
        task.apply(rotation(10.0));
        assert!((handle.stabilized_heading() - 55.0).abs() < 0.5);
        assert!((handle.current_pitch() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_unavailable_switches_to_deadzone_and_back() {
        let (mut task, _handle, _bus) = world();
        assert!(matches!(
            task.stabilizer().strategy(),
            StabilizerStrategy::Complementary { .. }
        ));

        task.apply(availability(SensorKind::Rotation, false));
        assert!(matches!(
            task.stabilizer().strategy(),
            StabilizerStrategy::Deadzone { .. }
        ));

        task.apply(availability(SensorKind::Rotation, true));
        assert_eq!(task.stabilizer().strategy(), StabilizerStrategy::complementary());
    }

    #[test]
    fn compass_only_converges_in_fallback() {
        let (mut task, handle, _bus) = world();
        task.apply(availability(SensorKind::Rotation, false));
        task.apply(compass(10.0));
        for _ in 0..300 {
            task.apply(compass(40.0));
        }
        assert!((handle.stabilized_heading() - 40.0).abs() < 1.0);
    }

    #[test]
    fn position_fix_and_loss() {
        let (mut task, handle, _bus) = world();
        let point = GeoPoint::new(35.0, 139.0);
        task.apply(SensorEvent::Position(PositionFix {
            point,
            accuracy_m: 4.0,
            timestamp: Utc::now(),
        }));
        assert_eq!(handle.position(), Some(point));

        task.apply(availability(SensorKind::Position, false));
        assert_eq!(handle.position(), None);
        assert!(!handle.availability().get(SensorKind::Position));
    }

    #[test]
    fn invalid_samples_never_reach_the_filter() {
        let (mut task, handle, _bus) = world();
        task.apply(compass(90.0));
        task.apply(compass(f64::NAN));
        task.apply(rotation(f64::INFINITY));
        assert!((handle.stabilized_heading() - 90.0).abs() < 1e-9);
        assert_eq!(task.rejected, 2);
    }

    #[tokio::test]
    async fn publishes_to_bus_topics() -> Result<(), Box<dyn std::error::Error>> {
        let (mut task, _handle, bus) = world();
        let mut orientation = bus.subscribe_to(Topic::Orientation);
        let mut status = bus.subscribe_to(Topic::SensorStatus);

        task.apply(compass(30.0));
        task.apply(availability(SensorKind::Orientation, true));
        // Repeating an unchanged status is not re-announced.
        task.apply(availability(SensorKind::Orientation, true));

        assert!(matches!(
            orientation.recv().await?.payload,
            EventPayload::Orientation(Orientation { heading_deg, .. }) if (heading_deg - 30.0).abs() < 1e-9
        ));
        assert!(matches!(
            status.recv().await?.payload,
            EventPayload::SensorStatus { kind: SensorKind::Orientation, available: true }
        ));
        assert!(status.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn run_drains_queue_in_order() {
        let (publisher, queue) = sensor_queue(16);
        let (task, handle) = spawn_world(WorldConfig::default(), queue, EventBus::default());
        let join = tokio::spawn(task.run());

        for deg in [100.0, 100.0, 100.0] {
            publisher.publish(compass(deg)).await.unwrap();
        }
        publisher.publish(rotation(0.0)).await.unwrap();
        publisher.publish(rotation(-20.0)).await.unwrap();
        drop(publisher);

        let stabilizer = join.await.unwrap();
        assert!((stabilizer.heading() - handle.stabilized_heading()).abs() < 1e-12);
        assert!((handle.stabilized_heading() - 80.0).abs() < 0.5);
    }
}
