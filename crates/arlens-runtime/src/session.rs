//! [`Session`] – one running AR world.
//!
//! Wires the pieces together for a single screen instance:
//!
//! 1. **Sense** – sensor drivers publish into the ordered sensor queue.
//! 2. **Stabilize** – the [`StabilizerTask`][crate::engine::StabilizerTask]
//!    drains the queue and updates the [`WorldHandle`].
//! 3. **Fetch** – a [`FetchCoordinator`] follower refreshes points of
//!    interest whenever the position or the search filters change.
//! 4. **Present** – [`Session::frame`] composes an [`OverlayFrame`] from the
//!    latest heading, position, zoom and result set.
//!
//! Only one session should run per screen; nothing in it is shared across
//! sessions.

use std::sync::Arc;

use arlens_hal::SimRig;
use arlens_middleware::{EventBus, SensorPublisher, sensor_queue};
use arlens_perception::{Projector, ProjectorConfig, SpringConfig, VisibilityPolicy};
use arlens_types::{ArError, Event, EventPayload, PointOfInterest, SearchFilters};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::{WorldConfig, WorldHandle, spawn_world};
use crate::fetch::{FetchCoordinator, PoiSet};
use crate::overlay::{OverlayFrame, Presenter, Selection};
use crate::provider::PoiProvider;
use crate::zoom::{ZoomGesture, ZoomLimits};

const SOURCE: &str = "arlens-runtime::session";

/// Configuration bundle for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub world: WorldConfig,
    pub projector: ProjectorConfig,
    pub visibility: VisibilityPolicy,
    pub spring: SpringConfig,
    pub zoom: ZoomLimits,
    pub filters: SearchFilters,
    /// Depth of the sensor queue.
    pub queue_capacity: usize,
    /// Per-topic depth of the event bus.
    pub bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            projector: ProjectorConfig::default(),
            visibility: VisibilityPolicy::default(),
            spring: SpringConfig::default(),
            zoom: ZoomLimits::default(),
            filters: SearchFilters::default(),
            queue_capacity: arlens_middleware::queue::DEFAULT_QUEUE_CAPACITY,
            bus_capacity: 256,
        }
    }
}

pub struct Session {
    bus: EventBus,
    world: WorldHandle,
    fetch: FetchCoordinator,
    results: watch::Receiver<PoiSet>,
    filters: watch::Sender<SearchFilters>,
    shutdown: watch::Sender<bool>,
    /// The only publisher outside the drivers; dropped by `shutdown` so the
    /// stabilizer task sees the queue close.
    publisher: SensorPublisher,
    presenter: Presenter,
    zoom: ZoomGesture,
    selection: Selection,
    last_frame: Option<OverlayFrame>,
    drivers: Vec<JoinHandle<Result<(), ArError>>>,
    stabilizer: JoinHandle<arlens_perception::HeadingStabilizer>,
    follower: JoinHandle<()>,
}

impl Session {
    /// Spawn the stabilizer task, the fetch follower and every driver in
    /// `rig`.
    pub async fn start(config: SessionConfig, provider: Arc<dyn PoiProvider>, rig: SimRig) -> Self {
        let bus = EventBus::new(config.bus_capacity);
        let (publisher, queue) = sensor_queue(config.queue_capacity);
        let (task, world) = spawn_world(config.world, queue, bus.clone());
        let stabilizer = tokio::spawn(task.run());

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (filters, filters_rx) = watch::channel(config.filters.clone());

        let fetch = FetchCoordinator::new(provider, bus.clone());
        let results = fetch.subscribe();
        let follower = tokio::spawn(fetch.clone().follow(
            world.watch_position(),
            filters_rx,
            shutdown_rx.clone(),
        ));

        let drivers = rig.spawn(publisher.clone(), shutdown_rx).await;
        info!(drivers = drivers.len(), "session started");

        Self {
            bus,
            world,
            fetch,
            results,
            filters,
            shutdown,
            publisher,
            presenter: Presenter::new(
                Projector::new(config.projector),
                config.visibility,
                config.spring,
            ),
            zoom: ZoomGesture::new(config.zoom),
            selection: Selection::default(),
            last_frame: None,
            drivers,
            stabilizer,
            follower,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn world(&self) -> &WorldHandle {
        &self.world
    }

    pub fn fetcher(&self) -> &FetchCoordinator {
        &self.fetch
    }

    /// The applied point-of-interest set.
    pub fn points(&self) -> Vec<PointOfInterest> {
        self.results.borrow().points.clone()
    }

    pub fn filters(&self) -> SearchFilters {
        self.filters.borrow().clone()
    }

    /// Change the search filters; triggers a refresh.
    pub fn update_filters(&self, edit: impl FnOnce(&mut SearchFilters)) {
        self.filters.send_modify(edit);
    }

    pub fn zoom(&mut self) -> &mut ZoomGesture {
        &mut self.zoom
    }

    pub fn set_projector(&mut self, projector: Projector) {
        self.presenter.set_projector(projector);
    }

    /// Compose the overlay for a tick `dt` seconds after the previous one.
    pub fn frame(&mut self, dt: f64) -> OverlayFrame {
        let filters = self.filters.borrow().clone();
        let frame = {
            let results = self.results.borrow();
            self.presenter.frame(
                dt,
                self.world.stabilized_heading(),
                &results.points,
                &filters,
                self.zoom.current(),
                self.world.position(),
            )
        };
        self.last_frame = Some(frame.clone());
        frame
    }

    /// Select a panel drawn in the most recent frame.
    pub fn tap(&mut self, id: &str) -> bool {
        match &self.last_frame {
            Some(frame) => self.selection.tap(id, frame),
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// The selected point, if it is still part of the current result set.
    pub fn selected(&self) -> Option<PointOfInterest> {
        self.selection.resolve(&self.results.borrow().points).cloned()
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.bus.publish_to(
            arlens_middleware::Topic::SystemAlerts,
            Event::new(
                SOURCE,
                EventPayload::Alert {
                    component: SOURCE.to_string(),
                    message: "session shutting down".to_string(),
                },
            ),
        );
        self.shutdown.send_replace(true);
        drop(self.publisher);

        for handle in self.drivers {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "sensor driver ended with error"),
                Err(e) => warn!(error = %e, "sensor driver task panicked"),
            }
        }
        if let Err(e) = self.follower.await {
            warn!(error = %e, "fetch follower task panicked");
        }
        match self.stabilizer.await {
            Ok(stabilizer) => info!(heading = stabilizer.heading(), "session stopped"),
            Err(e) => warn!(error = %e, "stabilizer task panicked"),
        }
    }
}
