//! Generic `SensorDriver` trait for compass, gyroscope and location sources.
//!
//! A driver owns one platform stream. It pushes samples into the shared
//! [`SensorPublisher`] until the shutdown flag flips or the queue's consumer
//! goes away. The stabilizer task never talks to a driver directly.

use arlens_middleware::SensorPublisher;
use arlens_types::{ArError, SensorKind};
use async_trait::async_trait;
use tokio::sync::watch;

/// A source of one kind of sensor sample.
#[async_trait]
pub trait SensorDriver: Send {
    /// Which stream this driver feeds.
    fn kind(&self) -> SensorKind;

    /// Publish samples until `shutdown` becomes `true` or the queue closes.
    ///
    /// A driver announces itself available before its first sample.
    ///
    /// # Errors
    ///
    /// Returns [`ArError::SensorUnavailable`] when the underlying hardware
    /// cannot be opened. A closed queue is a normal stop, not an error.
    async fn run(
        &mut self,
        publisher: SensorPublisher,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ArError>;
}
