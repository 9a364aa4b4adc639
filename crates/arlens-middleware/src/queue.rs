//! Ordered sensor queue.
//!
//! Compass, gyroscope and GPS callbacks arrive on whatever execution context
//! the platform chooses. Rather than letting each callback mutate shared
//! filter state, every stream pushes immutable [`SensorEvent`]s into one
//! bounded [`tokio::sync::mpsc`] channel. A single consumer task owns the
//! heading stabilizer, so updates are applied strictly one at a time in
//! arrival order and no lock is ever taken.
//!
//! [`SensorPublisher`] is the only way in, and it validates every sample:
//! a non-finite heading or an out-of-range coordinate is rejected with
//! [`ArError::InvalidSample`] before it can corrupt the filter.
//!
//! # Example
//!
//! ```rust
//! use arlens_middleware::queue::sensor_queue;
//! use arlens_types::{CompassSample, SensorEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (publisher, mut queue) = sensor_queue(16);
//!
//! let sample = CompassSample { true_heading_deg: Some(42.0), magnetic_heading_deg: 40.0 };
//! publisher.publish(SensorEvent::Compass(sample)).await.unwrap();
//!
//! let bad = CompassSample { true_heading_deg: None, magnetic_heading_deg: f64::NAN };
//! assert!(publisher.publish(SensorEvent::Compass(bad)).await.is_err());
//!
//! assert_eq!(queue.recv().await, Some(SensorEvent::Compass(sample)));
//! # }
//! ```

use arlens_types::{ArError, SensorEvent, SensorKind};
use tokio::sync::mpsc;
use tracing::warn;

/// Default queue depth: roughly one second of 60 Hz rotation samples plus
/// headroom for compass and GPS traffic.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Create a connected publisher / queue pair.
///
/// `capacity` must be non-zero; `0` is bumped to `1`.
pub fn sensor_queue(capacity: usize) -> (SensorPublisher, SensorQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SensorPublisher { tx }, SensorQueue { rx })
}

/// Check a raw sample before it enters the queue.
///
/// # Errors
///
/// Returns [`ArError::InvalidSample`] naming the offending stream.
pub fn validate(event: &SensorEvent) -> Result<(), ArError> {
    let reject = |stream: SensorKind, reason: String| Err(ArError::InvalidSample { stream, reason });
    match event {
        SensorEvent::Compass(c) => {
            let h = c.resolved_deg();
            if !h.is_finite() {
                return reject(SensorKind::Orientation, format!("heading {h} is not finite"));
            }
        }
        SensorEvent::Rotation(r) => {
            if !r.cumulative_yaw_rad.is_finite() || !r.pitch_rad.is_finite() {
                return reject(
                    SensorKind::Rotation,
                    format!("yaw {} / pitch {} not finite", r.cumulative_yaw_rad, r.pitch_rad),
                );
            }
        }
        SensorEvent::Position(fix) => {
            if !fix.point.is_valid() {
                return reject(
                    SensorKind::Position,
                    format!("coordinate {:?} out of range", fix.point),
                );
            }
            if !fix.accuracy_m.is_finite() || fix.accuracy_m < 0.0 {
                return reject(
                    SensorKind::Position,
                    format!("accuracy {} is not a distance", fix.accuracy_m),
                );
            }
        }
        SensorEvent::Availability { .. } => {}
    }
    Ok(())
}

/// Cloneable write side of the sensor queue. One clone per sensor driver.
#[derive(Clone, Debug)]
pub struct SensorPublisher {
    tx: mpsc::Sender<SensorEvent>,
}

impl SensorPublisher {
    /// Validate and enqueue `event`, waiting for space if the queue is full.
    ///
    /// # Errors
    ///
    /// [`ArError::InvalidSample`] for a rejected sample, or
    /// [`ArError::Channel`] once the consumer has shut down.
    pub async fn publish(&self, event: SensorEvent) -> Result<(), ArError> {
        validate(&event).inspect_err(|e| warn!(error = %e, "sensor sample rejected"))?;
        self.tx
            .send(event)
            .await
            .map_err(|_| ArError::Channel("sensor queue closed".to_string()))
    }

    /// Validate and enqueue `event` without waiting. Intended for
    /// synchronous platform callbacks.
    ///
    /// # Errors
    ///
    /// As [`SensorPublisher::publish`], plus [`ArError::Channel`] when the
    /// queue is full (the sample is dropped; the next one supersedes it).
    pub fn try_publish(&self, event: SensorEvent) -> Result<(), ArError> {
        validate(&event).inspect_err(|e| warn!(error = %e, "sensor sample rejected"))?;
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) => {
                ArError::Channel(format!("sensor queue full, dropped {:?} sample", ev.kind()))
            }
            mpsc::error::TrySendError::Closed(_) => {
                ArError::Channel("sensor queue closed".to_string())
            }
        })
    }

    /// Announce that a sensor became available or unavailable.
    pub async fn set_available(&self, kind: SensorKind, available: bool) -> Result<(), ArError> {
        self.publish(SensorEvent::Availability { kind, available }).await
    }

    /// `true` once the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side of the sensor queue. Exactly one exists per world.
#[derive(Debug)]
pub struct SensorQueue {
    rx: mpsc::Receiver<SensorEvent>,
}

impl SensorQueue {
    /// Wait for the next sample. Returns `None` once every publisher has
    /// been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<SensorEvent> {
        self.rx.recv().await
    }

    /// Take the next sample if one is already queued.
    pub fn try_recv(&mut self) -> Option<SensorEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new samples; already-queued ones can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arlens_types::{CompassSample, GeoPoint, PositionFix, RotationSample};
    use chrono::Utc;

    fn compass(deg: f64) -> SensorEvent {
        SensorEvent::Compass(CompassSample {
            true_heading_deg: Some(deg),
            magnetic_heading_deg: deg,
        })
    }

    fn rotation(yaw: f64) -> SensorEvent {
        SensorEvent::Rotation(RotationSample {
            cumulative_yaw_rad: yaw,
            pitch_rad: 0.0,
        })
    }

    fn fix(lat: f64, lng: f64, accuracy_m: f64) -> SensorEvent {
        SensorEvent::Position(PositionFix {
            point: GeoPoint::new(lat, lng),
            accuracy_m,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn preserves_arrival_order_across_streams() -> Result<(), Box<dyn std::error::Error>> {
        let (publisher, mut queue) = sensor_queue(8);
        let gyro = publisher.clone();

        publisher.publish(compass(10.0)).await?;
        gyro.publish(rotation(0.1)).await?;
        publisher.publish(fix(35.0, 139.0, 5.0)).await?;

        assert_eq!(queue.recv().await.map(|e| e.kind()), Some(SensorKind::Orientation));
        assert_eq!(queue.recv().await.map(|e| e.kind()), Some(SensorKind::Rotation));
        assert_eq!(queue.recv().await.map(|e| e.kind()), Some(SensorKind::Position));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_non_finite_samples() {
        let (publisher, mut queue) = sensor_queue(8);
        assert!(publisher.publish(compass(f64::NAN)).await.is_err());
        assert!(publisher.publish(rotation(f64::INFINITY)).await.is_err());
        assert!(publisher.publish(fix(f64::NAN, 0.0, 1.0)).await.is_err());
        assert!(publisher.publish(fix(35.0, 139.0, -3.0)).await.is_err());
        assert!(queue.try_recv().is_none(), "rejected samples must not be queued");
    }

    #[test]
    fn validate_reports_stream() {
        let err = validate(&compass(f64::NAN)).unwrap_err();
        assert!(matches!(
            err,
            ArError::InvalidSample {
                stream: SensorKind::Orientation,
                ..
            }
        ));
        assert!(validate(&fix(95.0, 0.0, 1.0)).is_err());
        assert!(validate(&SensorEvent::Availability {
            kind: SensorKind::Rotation,
            available: false
        })
        .is_ok());
    }

    #[tokio::test]
    async fn try_publish_drops_when_full() {
        let (publisher, mut queue) = sensor_queue(1);
        publisher.try_publish(rotation(0.0)).expect("first fits");
        let err = publisher.try_publish(rotation(0.1)).unwrap_err();
        assert!(matches!(err, ArError::Channel(_)));
        assert_eq!(queue.recv().await, Some(rotation(0.0)));
    }

    #[tokio::test]
    async fn publish_after_consumer_dropped_is_channel_error() {
        let (publisher, queue) = sensor_queue(4);
        drop(queue);
        assert!(publisher.is_closed());
        assert!(matches!(
            publisher.publish(compass(1.0)).await,
            Err(ArError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn queue_ends_when_publishers_dropped() {
        let (publisher, mut queue) = sensor_queue(4);
        publisher.set_available(SensorKind::Position, false).await.unwrap();
        drop(publisher);
        assert!(matches!(
            queue.recv().await,
            Some(SensorEvent::Availability { available: false, .. })
        ));
        assert_eq!(queue.recv().await, None);
    }
}
