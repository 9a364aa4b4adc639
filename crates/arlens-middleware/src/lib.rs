//! `arlens-middleware` – message passing between sensors, the world model
//! and the render side.
//!
//! # Modules
//!
//! - [`queue`] – the single ordered [`SensorQueue`] every sensor stream
//!   writes into and exactly one stabilizer task reads from. Samples are
//!   validated at the publisher so non-finite values never reach the
//!   filter.
//! - [`bus`] – topic-based publish/subscribe [`EventBus`] built on Tokio
//!   broadcast channels, fanning orientation, world and alert events out to
//!   any number of consumers.

pub mod bus;
pub mod queue;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use queue::{SensorPublisher, SensorQueue, sensor_queue, validate};
