use std::cell::RefCell;
use std::rc::Rc;

use foundation::{Viewpoint, direction_bucket};
use futures_util::future::join_all;
use runtime::{InFlightGuard, InFlightToken, Metrics, MetricsSnapshot, Subject};
use tracing::{debug, trace, warn};

use crate::cache::{SideViewCache, SideViewKey};
use crate::host::{MapRegistry, enrich_elevation};
use crate::kind::{Direction, MapKind, SideViewKind};
use crate::side_view::SideView;

/// One synchronized side view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSlot {
    pub key: SideViewKey,
    /// Locks an oblique map to this direction.
    pub direction: Option<Direction>,
}

impl SyncSlot {
    pub fn new(key: SideViewKey, direction: Option<Direction>) -> Self {
        Self { key, direction }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Another update was in flight.
    Dropped,
    /// No usable primary viewpoint.
    Idle,
    Synced { dispatched: usize, failed: usize },
}

/// Pushes the primary viewpoint to every side view slot.
///
/// Updates never overlap: a call made while another is running returns
/// [`UpdateOutcome::Dropped`] and the next render tick catches up. Views are
/// resolved through the cache on every pass; the synchronizer only keeps keys.
pub struct ViewSynchronizer {
    maps: Rc<dyn MapRegistry>,
    cache: Rc<SideViewCache>,
    slots: RefCell<Vec<SyncSlot>>,
    guard: InFlightGuard,
    active_view: Subject<Option<usize>>,
    last_viewpoint: Subject<Option<Viewpoint>>,
    metrics: RefCell<Metrics>,
}

impl ViewSynchronizer {
    pub fn new(maps: Rc<dyn MapRegistry>, cache: Rc<SideViewCache>) -> Self {
        Self {
            maps,
            cache,
            slots: RefCell::new(Vec::new()),
            guard: InFlightGuard::new(),
            active_view: Subject::new(None),
            last_viewpoint: Subject::new(None),
            metrics: RefCell::new(Metrics::new()),
        }
    }

    pub fn set_slots(&self, slots: Vec<SyncSlot>) {
        *self.slots.borrow_mut() = slots;
    }

    pub fn slots(&self) -> Vec<SyncSlot> {
        self.slots.borrow().clone()
    }

    /// Index of the slot facing the primary heading.
    pub fn active_view(&self) -> Option<usize> {
        self.active_view.get()
    }

    pub fn active_view_subject(&self) -> &Subject<Option<usize>> {
        &self.active_view
    }

    /// Primary viewpoint of the last completed pass, elevation included.
    pub fn last_viewpoint(&self) -> Option<Viewpoint> {
        self.last_viewpoint.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.borrow().snapshot()
    }

    pub fn is_updating(&self) -> bool {
        self.guard.is_busy()
    }

    /// Blocks updates until the token is dropped.
    ///
    /// `None` if an update is running.
    pub fn suspend(&self) -> Option<InFlightToken> {
        self.guard.try_enter()
    }

    /// Waits for a running update to finish, then blocks updates until the
    /// token is dropped.
    pub async fn suspend_when_idle(&self) -> InFlightToken {
        self.guard.enter().await
    }

    /// Forgets slots and derived state.
    pub fn reset(&self) {
        self.slots.borrow_mut().clear();
        self.active_view.publish(None);
        self.last_viewpoint.publish(None);
    }

    pub async fn update(&self) -> UpdateOutcome {
        let Some(_token) = self.guard.try_enter() else {
            trace!("sync dropped, update in flight");
            self.metrics.borrow_mut().incr("sync.dropped");
            return UpdateOutcome::Dropped;
        };
        self.metrics.borrow_mut().incr("sync.updates");

        let Some(primary) = self.maps.active_map() else {
            return self.idle();
        };
        let primary_kind = primary.kind();
        if primary_kind == MapKind::Panorama && !primary.has_content() {
            return self.idle();
        }
        let Some(mut viewpoint) = primary.viewpoint().await.filter(Viewpoint::is_valid) else {
            return self.idle();
        };

        let targets: Vec<(SyncSlot, SideView)> = self
            .slots
            .borrow()
            .iter()
            .filter_map(|slot| self.cache.get(&slot.key).map(|view| (*slot, view)))
            .collect();

        self.enrich(&mut viewpoint, &targets).await;
        let bucket = direction_bucket(viewpoint.heading);

        let mut planned = Vec::with_capacity(targets.len());
        for (slot, view) in &targets {
            let target = target_viewpoint(&viewpoint, primary_kind, slot.direction, view.kind());
            if target.is_valid() {
                planned.push((slot, view, target));
            } else {
                debug!(key = %slot.key, "side view skipped, its viewpoint has no anchor");
            }
        }
        let skipped = targets.len() - planned.len();
        let results = join_all(
            planned
                .iter()
                .map(|(_, view, target)| view.goto_viewpoint(target.clone())),
        )
        .await;

        let mut failed = 0;
        for ((slot, _, _), result) in planned.iter().zip(&results) {
            if let Err(err) = result {
                failed += 1;
                warn!(key = %slot.key, %err, "side view dispatch failed");
            }
        }

        let active = if primary_kind.is_directional() {
            self.slots
                .borrow()
                .iter()
                .position(|s| s.direction.map(Direction::index) == Some(bucket))
        } else {
            None
        };
        {
            let mut metrics = self.metrics.borrow_mut();
            metrics.add("sync.dispatches", results.len() as u64);
            metrics.add("sync.dispatch_failures", failed as u64);
            metrics.add("sync.skipped", skipped as u64);
            metrics.record("sync.fanout", results.len() as i64);
            metrics.set_gauge("sync.active_view", active.map_or(-1, |i| i as i64));
        }
        debug!(heading = viewpoint.heading, bucket, ?active, "side views synced");
        self.active_view.publish(active);
        self.last_viewpoint.publish(Some(viewpoint));

        UpdateOutcome::Synced {
            dispatched: results.len(),
            failed,
        }
    }

    fn idle(&self) -> UpdateOutcome {
        let mut metrics = self.metrics.borrow_mut();
        metrics.incr("sync.idle");
        metrics.set_gauge("sync.active_view", -1);
        drop(metrics);
        self.active_view.publish(None);
        UpdateOutcome::Idle
    }

    /// Fills a missing ground elevation with one lookup shared by all views.
    async fn enrich(&self, viewpoint: &mut Viewpoint, targets: &[(SyncSlot, SideView)]) {
        let Some(ground) = viewpoint.ground_position.as_mut() else {
            return;
        };
        if ground.has_elevation() {
            return;
        }
        let terrain = targets
            .iter()
            .filter(|(_, view)| view.kind().is_elevation_aware())
            .find_map(|(_, view)| view.terrain());
        let Some(terrain) = terrain else { return };

        self.metrics.borrow_mut().incr("sync.elevation_lookups");
        if let Err(err) = enrich_elevation(terrain.as_ref(), ground).await {
            warn!(%err, "elevation lookup failed");
        }
    }
}

/// Viewpoint a side view of `target` kind receives for `primary`.
///
/// The result may be unanchored, e.g. a globe pose without a camera position
/// sent to a panorama; callers skip those.
pub fn target_viewpoint(
    primary: &Viewpoint,
    primary_kind: MapKind,
    direction: Option<Direction>,
    target: SideViewKind,
) -> Viewpoint {
    match direction {
        Some(direction) if target == SideViewKind::Map(MapKind::Oblique) => {
            primary.rotated_to(direction.heading())
        }
        _ if target.is_panorama() && primary_kind == MapKind::Globe => Viewpoint {
            ground_position: None,
            ..primary.clone()
        },
        _ => primary.clone(),
    }
}
