use std::cell::{Cell, RefCell};
use std::rc::Rc;

use foundation::{CollectionId, RenderTarget, Viewpoint};
use futures_util::FutureExt;
use futures_util::future::join_all;
use runtime::{
    InFlightGuard, MetricsSnapshot, Signal, SignalError, Subject, Subscription, TeardownError,
};
use tracing::{debug, info, warn};

use crate::cache::{CollectionPolicy, SideViewCache, SideViewKey};
use crate::config::MultiViewConfig;
use crate::error::MultiViewError;
use crate::host::Host;
use crate::kind::{MapKind, ViewDescriptor};
use crate::primary::PrimaryViewWatcher;
use crate::side_view::SideView;
use crate::sync::{SyncSlot, ViewSynchronizer};
use crate::tracker::DefaultCollectionTracker;

/// Pitch the primary map takes when jumping to a side view.
pub const JUMP_PITCH: f64 = -45.0;

const DEFAULT_TARGET_PREFIX: &str = "multi-view-map";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Inactive,
    Active,
}

/// Multi-view panel: one side view per configured slot, all synchronized
/// with the primary map.
///
/// Disabled while no default oblique collection exists; losing it while
/// active deactivates the panel.
pub struct MultiViewManager {
    inner: Rc<ManagerInner>,
}

struct ManagerInner {
    host: Host,
    config: MultiViewConfig,
    target_prefix: RefCell<String>,
    tracker: DefaultCollectionTracker,
    cache: Rc<SideViewCache>,
    sync: Rc<ViewSynchronizer>,
    state: Cell<ManagerState>,
    activating: InFlightGuard,
    state_changed: Signal<bool>,
    session: RefCell<Option<Session>>,
    destroyed: Cell<bool>,
}

/// Listeners of one activation.
struct Session {
    watcher: PrimaryViewWatcher,
    subscriptions: Vec<Subscription>,
}

impl MultiViewManager {
    pub fn new(host: Host, config: MultiViewConfig) -> Self {
        let tracker = DefaultCollectionTracker::start(Rc::clone(&host.maps), MapKind::Oblique);
        let cache = Rc::new(SideViewCache::new(
            host.clone(),
            CollectionPolicy::Tracked(tracker.clone()),
        ));
        let sync = Rc::new(ViewSynchronizer::new(Rc::clone(&host.maps), Rc::clone(&cache)));
        Self {
            inner: Rc::new(ManagerInner {
                host,
                config,
                target_prefix: RefCell::new(DEFAULT_TARGET_PREFIX.to_owned()),
                tracker,
                cache,
                sync,
                state: Cell::new(ManagerState::Inactive),
                activating: InFlightGuard::new(),
                state_changed: Signal::new(),
                session: RefCell::new(None),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// Slot `i` renders into `{prefix}-{i}`.
    pub fn with_target_prefix(self, prefix: impl Into<String>) -> Self {
        *self.inner.target_prefix.borrow_mut() = prefix.into();
        self
    }

    pub fn config(&self) -> &MultiViewConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ManagerState {
        self.inner.state.get()
    }

    pub fn active(&self) -> bool {
        self.state() == ManagerState::Active
    }

    /// `true` while no default collection is available.
    pub fn disabled(&self) -> bool {
        self.inner.tracker.disabled()
    }

    pub fn disabled_subject(&self) -> &Subject<bool> {
        self.inner.tracker.disabled_subject()
    }

    pub fn default_collection(&self) -> Option<CollectionId> {
        self.inner.tracker.collection()
    }

    pub fn active_view_index(&self) -> Option<usize> {
        self.inner.sync.active_view()
    }

    pub fn active_view_subject(&self) -> &Subject<Option<usize>> {
        self.inner.sync.active_view_subject()
    }

    /// Raised with the new state on every activation and deactivation.
    pub fn state_changed(&self) -> Signal<bool> {
        self.inner.state_changed.clone()
    }

    /// Side views in slot order. Empty while inactive.
    pub fn views(&self) -> Vec<SideView> {
        self.inner
            .sync
            .slots()
            .iter()
            .filter_map(|slot| self.inner.cache.get(&slot.key))
            .collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.sync.metrics()
    }

    /// Builds, synchronizes and activates a side view per configured slot.
    ///
    /// Does nothing if already active, activating, disabled or destroyed.
    pub async fn activate(&self) -> Result<(), MultiViewError> {
        let inner = &self.inner;
        if inner.destroyed.get() || self.active() || self.disabled() {
            return Ok(());
        }
        let Some(_activating) = inner.activating.try_enter() else {
            debug!("activation already in progress");
            return Ok(());
        };

        let descriptors = inner.config.descriptors()?;
        let primary = inner.host.maps.active_map();
        let viewpoint = match primary {
            Some(primary) => primary.viewpoint().await,
            None => None,
        };
        if !viewpoint.as_ref().is_some_and(Viewpoint::is_valid) {
            return Err(MultiViewError::NoViewpoint);
        }
        let pinned = descriptors
            .iter()
            .map(|d| self.pinned_collection(d))
            .collect::<Result<Vec<_>, _>>()?;

        let keys: Vec<SideViewKey> = descriptors
            .iter()
            .enumerate()
            .map(|(slot, d)| SideViewKey::slot(d.kind, slot as u16))
            .collect();
        let created = join_all(
            keys.iter()
                .zip(pinned)
                .map(|(key, pinned)| inner.cache.get_or_create_with(*key, pinned)),
        )
        .await;
        if let Some(slot) = created.iter().position(Option::is_none) {
            inner.discard_views();
            return Err(MultiViewError::Construction { slot });
        }
        let views: Vec<SideView> = created.into_iter().flatten().collect();
        let prefix = inner.target_prefix.borrow().clone();
        for (slot, view) in views.iter().enumerate() {
            let target = RenderTarget::new(format!("{prefix}-{slot}"));
            view.set_target(Some(target));
        }

        inner.sync.set_slots(
            keys.iter()
                .zip(&descriptors)
                .map(|(key, d)| SyncSlot::new(*key, d.direction.filter(|_| d.is_directional())))
                .collect(),
        );
        self.open_session();

        inner.sync.update().await;
        let results = join_all(views.iter().map(SideView::activate)).await;
        for (slot, result) in results.into_iter().enumerate() {
            if let Err(err) = result {
                warn!(slot, %err, "side view activation failed");
            }
        }

        if inner.destroyed.get() || self.disabled() {
            debug!("default collection lost during activation");
            if let Err(err) = inner.close_session() {
                warn!(%err, "side view teardown incomplete");
            }
            return Ok(());
        }
        inner.state.set(ManagerState::Active);
        info!(views = views.len(), "multi view activated");
        inner.state_changed.emit(&true);
        Ok(())
    }

    fn pinned_collection(&self, descriptor: &ViewDescriptor) -> Result<Option<CollectionId>, MultiViewError> {
        if !descriptor.kind.is_oblique() {
            return Ok(None);
        }
        match &descriptor.collection {
            Some(name) => self
                .inner
                .host
                .collections
                .get(name)
                .map(Some)
                .ok_or_else(|| MultiViewError::UnknownCollection(name.clone())),
            None if self.inner.tracker.collection().is_none() => Err(MultiViewError::NoCollection),
            None => Ok(None),
        }
    }

    fn open_session(&self) {
        let inner = &self.inner;
        let watcher = PrimaryViewWatcher::attach(inner.host.maps.as_ref());
        let weak = Rc::downgrade(inner);
        let changed = watcher.changed().subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_update();
            }
        });
        let weak = Rc::downgrade(inner);
        let collection = inner.tracker.collection_subject().subscribe(move |collection| {
            let Some(inner) = weak.upgrade() else { return };
            match collection {
                Some(collection) => inner.schedule_retarget(collection.clone()),
                None => {
                    debug!("default collection gone");
                    inner.deactivate();
                }
            }
        });
        *inner.session.borrow_mut() = Some(Session {
            watcher,
            subscriptions: vec![changed, collection],
        });
    }

    /// Tears the side views down. Safe to call at any time, including from
    /// a listener.
    pub fn deactivate(&self) {
        self.inner.deactivate();
    }

    /// Points the primary map at the side view in `slot`, looking down at
    /// [`JUMP_PITCH`] from the primary's current distance.
    pub async fn jump_to_view(&self, slot: usize) -> Result<(), MultiViewError> {
        let inner = &self.inner;
        let key = inner
            .sync
            .slots()
            .get(slot)
            .map(|s| s.key)
            .ok_or(MultiViewError::UnknownSlot(slot))?;
        let view = inner.cache.get(&key).ok_or(MultiViewError::UnknownSlot(slot))?;
        let side = view.viewpoint().await.ok_or(MultiViewError::NoViewpoint)?;
        let primary = inner.host.maps.active_map().ok_or(MultiViewError::NoViewpoint)?;
        let current = primary.viewpoint().await.ok_or(MultiViewError::NoViewpoint)?;
        let anchor = side.anchor().ok_or(MultiViewError::NoViewpoint)?;

        let target = Viewpoint::looking_at(anchor, current.distance, side.heading).with_pitch(JUMP_PITCH);
        debug!(slot, heading = target.heading, "jumping to side view");
        primary.goto_viewpoint(target).await?;
        Ok(())
    }

    /// Deactivates, then releases every remaining listener. Irreversible.
    ///
    /// Teardown runs to completion; listeners that could not be released
    /// are reported afterwards.
    pub fn destroy(&self) -> Result<(), MultiViewError> {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return Ok(());
        }
        let mut failures: Vec<SignalError> = Vec::new();
        let was_active = inner.state.replace(ManagerState::Inactive) == ManagerState::Active;
        if let Err(err) = inner.close_session() {
            failures.extend(err.failures);
        }
        if was_active {
            inner.state_changed.emit(&false);
        }
        inner.state_changed.destroy();
        if let Err(err) = inner.tracker.destroy() {
            failures.extend(err.failures);
        }
        info!("multi view destroyed");
        TeardownError::check(failures).map_err(MultiViewError::from)
    }
}

impl ManagerInner {
    fn deactivate(&self) {
        if self.state.get() != ManagerState::Active {
            return;
        }
        self.state.set(ManagerState::Inactive);
        if let Err(err) = self.close_session() {
            warn!(%err, "side view teardown incomplete");
        }
        info!("multi view deactivated");
        self.state_changed.emit(&false);
    }

    /// Releases the session listeners and destroys every side view.
    fn close_session(&self) -> Result<(), TeardownError> {
        let mut failures: Vec<SignalError> = Vec::new();
        let session = self.session.borrow_mut().take();
        if let Some(session) = session {
            if let Err(err) = runtime::teardown(session.subscriptions) {
                failures.extend(err.failures);
            }
            if let Err(err) = session.watcher.detach() {
                failures.extend(err.failures);
            }
        }
        if let Err(err) = self.cache.destroy_all() {
            failures.extend(err.failures);
        }
        self.sync.reset();
        TeardownError::check(failures)
    }

    fn discard_views(&self) {
        if let Err(err) = self.cache.destroy_all() {
            warn!(%err, "side view teardown incomplete");
        }
        self.sync.reset();
    }

    fn schedule_update(&self) {
        if self.destroyed.get() {
            return;
        }
        let sync = Rc::clone(&self.sync);
        self.host.spawner.spawn(
            async move {
                sync.update().await;
            }
            .boxed_local(),
        );
    }

    fn schedule_retarget(&self, collection: CollectionId) {
        let cache = Rc::clone(&self.cache);
        self.host.spawner.spawn(
            async move {
                let retargeted = cache.retarget(&collection).await;
                debug!(%collection, retargeted, "side views follow default collection");
            }
            .boxed_local(),
        );
    }
}
