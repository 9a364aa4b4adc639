//! [`EventBus`] – change feed for anything outside the stabilizer task.
//!
//! Each [`Topic`] is its own [`tokio::sync::broadcast`] channel. A slow
//! reader only loses its own backlog (it sees `Lagged`); publishers and
//! other readers are never held up.
//!
//! # Topics
//!
//! | Topic | Carries |
//! |---|---|
//! | [`Topic::Orientation`] | Stabilized heading / pitch after every fused sample |
//! | [`Topic::World`] | Accepted position fixes and replaced point-of-interest sets |
//! | [`Topic::SensorStatus`] | Sensors becoming available or unavailable |
//! | [`Topic::SystemAlerts`] | Provider failures, shutdown notices |

use arlens_types::{ArError, Event};
use tokio::sync::broadcast;
use tracing::trace;

/// Events buffered per topic before the oldest are overwritten.
const BUS_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every fused orientation; high rate.
    Orientation,
    /// Position fixes and point-of-interest result sets.
    World,
    /// Per-sensor availability changes.
    SensorStatus,
    /// Operator-visible alerts.
    SystemAlerts,
}

/// Handle to the four topic channels. Clones publish into the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    orientation: broadcast::Sender<Event>,
    world: broadcast::Sender<Event>,
    sensor_status: broadcast::Sender<Event>,
    alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// `depth` events are buffered per topic; `0` is treated as `1`.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            orientation: broadcast::channel(depth).0,
            world: broadcast::channel(depth).0,
            sensor_status: broadcast::channel(depth).0,
            alerts: broadcast::channel(depth).0,
        }
    }

    /// Hand `event` to every current reader of `topic` and return how many
    /// there were.
    ///
    /// A topic nobody reads yields `Ok(0)`; a headless world runs like that.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ArError> {
        let channel = self.channel(topic);
        if channel.receiver_count() == 0 {
            trace!(?topic, "no readers; event dropped");
            return Ok(0);
        }
        channel
            .send(event)
            .map_err(|_| ArError::Channel(format!("readers of {topic:?} went away mid-send")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            inner: self.channel(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channel(topic).receiver_count()
    }

    fn channel(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Orientation => &self.orientation,
            Topic::World => &self.world,
            Topic::SensorStatus => &self.sensor_status,
            Topic::SystemAlerts => &self.alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BUS_DEPTH)
    }
}

/// Reading end of one topic, from [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    inner: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event on the topic.
    ///
    /// `Lagged(n)` means `n` events were overwritten before this reader got
    /// to them; the next call resumes with the oldest one still buffered.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.inner.recv().await
    }

    /// Next buffered event, without waiting.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.inner.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arlens_types::{EventPayload, Orientation};
    use std::time::Duration;

    fn heading_event(heading_deg: f64) -> Event {
        Event::new(
            "bus-test",
            EventPayload::Orientation(Orientation {
                heading_deg,
                pitch_deg: None,
            }),
        )
    }

    #[test]
    fn unread_topic_accepts_events() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::Orientation, heading_event(0.0)).unwrap(), 0);
    }

    #[tokio::test]
    async fn every_reader_gets_a_copy() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut renderer = bus.subscribe_to(Topic::Orientation);
        let mut recorder = bus.subscribe_to(Topic::Orientation);

        let sent = heading_event(12.0);
        assert_eq!(bus.publish_to(Topic::Orientation, sent.clone())?, 2);

        assert_eq!(renderer.recv().await?.id, sent.id);
        assert_eq!(recorder.recv().await?.id, sent.id);
        Ok(())
    }

    #[tokio::test]
    async fn orientation_traffic_stays_off_alerts() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let _renderer = bus.subscribe_to(Topic::Orientation);

        bus.publish_to(Topic::Orientation, heading_event(1.0))?;

        let waited = tokio::time::timeout(Duration::from_millis(50), alerts.recv()).await;
        assert!(waited.is_err(), "alerts reader saw an orientation event");
        assert_eq!(alerts.topic(), Topic::SystemAlerts);
        Ok(())
    }

    #[tokio::test]
    async fn slow_reader_sees_lag_then_resumes() {
        let bus = EventBus::new(16);
        let mut slow = bus.subscribe_to(Topic::Orientation);

        for i in 0..100 {
            let _ = bus.publish_to(Topic::Orientation, heading_event(f64::from(i)));
        }

        match slow.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert_eq!(missed, 84),
            other => panic!("expected lag, got {other:?}"),
        }
        assert!(slow.recv().await.is_ok());
    }

    #[test]
    fn subscriber_count_follows_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::World), 0);
        let rx = bus.subscribe_to(Topic::World);
        assert_eq!(bus.subscriber_count(Topic::World), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::World), 0);
    }

    #[test]
    fn try_recv_does_not_wait() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::SensorStatus);
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));

        bus.publish_to(Topic::SensorStatus, heading_event(5.0))?;
        assert!(rx.try_recv().is_ok());
        Ok(())
    }
}
