//! [`FetchCoordinator`] – sequenced point-of-interest refreshes.
//!
//! A refresh is triggered by every position fix and every filter change, so
//! requests overlap and may complete out of order. The coordinator stamps
//! each request with a monotonically increasing sequence number and only
//! applies a response whose number is still the latest issued. Older
//! responses are dropped with a `debug!` line.
//!
//! A failed request resolves to an **empty** set (and a `warn!` plus a
//! `SystemAlerts` event) so stale points never linger on screen as if they
//! were current. Retrying is left to whoever triggers the next refresh.
//!
//! The latest applied set lives in a `watch` channel; each replacement is
//! also announced on the `World` topic of the [`EventBus`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arlens_middleware::{EventBus, Topic};
use arlens_types::{Event, EventPayload, GeoPoint, PointOfInterest, SearchFilters};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::provider::{PoiProvider, PoiQuery, ProviderError};

const SOURCE: &str = "arlens-runtime::fetch";

/// The currently applied result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiSet {
    /// Sequence number of the request that produced this set; `0` before
    /// any request completed.
    pub sequence: u64,
    pub points: Vec<PointOfInterest>,
}

/// What happened to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the current set.
    Applied { sequence: u64, count: usize },
    /// The provider failed; the current set was replaced by an empty one.
    Failed { sequence: u64 },
    /// A newer request had already been issued; the response was dropped.
    Stale { sequence: u64 },
}

/// Issues sequenced requests against one provider. Clones share the sequence
/// counter and the result channel.
#[derive(Clone)]
pub struct FetchCoordinator {
    provider: Arc<dyn PoiProvider>,
    bus: EventBus,
    latest: Arc<AtomicU64>,
    results: Arc<watch::Sender<PoiSet>>,
}

impl FetchCoordinator {
    pub fn new(provider: Arc<dyn PoiProvider>, bus: EventBus) -> Self {
        let (results, _) = watch::channel(PoiSet::default());
        Self {
            provider,
            bus,
            latest: Arc::new(AtomicU64::new(0)),
            results: Arc::new(results),
        }
    }

    /// Receiver for the applied result set.
    pub fn subscribe(&self) -> watch::Receiver<PoiSet> {
        self.results.subscribe()
    }

    /// A copy of the applied result set.
    pub fn current(&self) -> PoiSet {
        self.results.borrow().clone()
    }

    /// The most recently issued sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Reserve the next sequence number. Any response carrying an older
    /// number is stale from this point on.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run one request to completion and apply it if it is still current.
    pub async fn fetch(&self, query: PoiQuery) -> FetchOutcome {
        let sequence = self.issue();
        debug!(sequence, provider = self.provider.name(), range = query.range.code(), "fetch issued");
        let result = self.provider.fetch(&query).await;
        self.complete(sequence, result)
    }

    /// Like [`fetch`][Self::fetch] but on a spawned task, so a newer request
    /// can supersede it while it is in flight.
    pub fn spawn_fetch(&self, query: PoiQuery) -> JoinHandle<FetchOutcome> {
        let sequence = self.issue();
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.provider.fetch(&query).await;
            this.complete(sequence, result)
        })
    }

    /// Apply the response for `sequence`.
    ///
    /// The staleness check and the replacement happen under the channel's
    /// write lock, so a late response can never overwrite a newer one.
    pub fn complete(
        &self,
        sequence: u64,
        result: Result<Vec<PointOfInterest>, ProviderError>,
    ) -> FetchOutcome {
        let (points, failed) = match result {
            Ok(points) => (points, false),
            Err(e) => {
                warn!(sequence, provider = self.provider.name(), error = %e, "point-of-interest fetch failed; showing no results");
                (Vec::new(), true)
            }
        };
        let count = points.len();

        let latest = &self.latest;
        let applied = self.results.send_if_modified(|current| {
            if sequence != latest.load(Ordering::SeqCst) || sequence <= current.sequence {
                return false;
            }
            *current = PoiSet { sequence, points };
            true
        });

        if !applied {
            debug!(sequence, latest = self.latest_sequence(), "stale fetch result discarded");
            return FetchOutcome::Stale { sequence };
        }

        self.publish(
            Topic::World,
            EventPayload::PointsOfInterest { sequence, count },
        );
        if failed {
            self.publish(
                Topic::SystemAlerts,
                EventPayload::Alert {
                    component: SOURCE.to_string(),
                    message: "point-of-interest provider failed; showing no results".to_string(),
                },
            );
            FetchOutcome::Failed { sequence }
        } else {
            info!(sequence, count, "point-of-interest set replaced");
            FetchOutcome::Applied { sequence, count }
        }
    }

    /// Refresh whenever the position or the filters change, until `shutdown`
    /// flips. A fix-less world issues no request.
    pub async fn follow(
        self,
        mut position: watch::Receiver<Option<GeoPoint>>,
        mut filters: watch::Receiver<SearchFilters>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            // Both versions are marked seen before branching, otherwise an
            // unseen filter change wakes `changed()` again at once.
            let origin = *position.borrow_and_update();
            let current = filters.borrow_and_update().clone();
            if let Some(query) = origin.map(|center| PoiQuery::new(center, &current)) {
                // The handle is dropped; completion is observed through the
                // result channel.
                let _ = self.spawn_fetch(query);
            }

            tokio::select! {
                r = position.changed() => if r.is_err() { break },
                r = filters.changed() => if r.is_err() { break },
                r = shutdown.changed() => if r.is_err() || *shutdown.borrow() { break },
            }
        }
        debug!("fetch follower stopped");
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            debug!(?topic, error = %e, "bus publish failed");
        }
    }
}
