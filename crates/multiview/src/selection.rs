//! Single side panel showing one alternate view of the primary map.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use foundation::{RenderTarget, Viewpoint};
use futures_util::FutureExt;
use runtime::{MetricsSnapshot, Signal, SignalError, Subject, Subscription, TeardownError};
use tracing::{debug, info, warn};

use crate::cache::{CollectionPolicy, SideViewCache, SideViewKey};
use crate::config::MultiViewConfig;
use crate::error::MultiViewError;
use crate::host::{Host, MapView, PointerEvent};
use crate::kind::{MapKind, SideViewKind};
use crate::primary::PrimaryViewWatcher;
use crate::side_view::SideView;
use crate::sync::{SyncSlot, ViewSynchronizer};

/// Chooses which side view kind is shown and keeps it in step with the
/// primary map.
///
/// One instance per kind is built on first use and kept until the kind stops
/// being available or the selector is destroyed.
pub struct SideViewSelector {
    inner: Rc<SelectorInner>,
}

struct SelectorInner {
    host: Host,
    config: MultiViewConfig,
    cache: Rc<SideViewCache>,
    sync: Rc<ViewSynchronizer>,
    watcher: PrimaryViewWatcher,
    available: RefCell<Vec<SideViewKind>>,
    active: Subject<Option<SideViewKind>>,
    sync_enabled: Subject<bool>,
    subscriptions: RefCell<Vec<Subscription>>,
    primary_collection: RefCell<Option<Subscription>>,
    destroyed: Cell<bool>,
}

impl SideViewSelector {
    pub fn new(host: Host, config: MultiViewConfig, target: RenderTarget) -> Self {
        let policy = CollectionPolicy::Registry {
            configured: config.oblique_collection_name.clone(),
        };
        let cache = Rc::new(SideViewCache::new(host.clone(), policy).with_target(target));
        let sync = Rc::new(ViewSynchronizer::new(Rc::clone(&host.maps), Rc::clone(&cache)));
        let watcher = PrimaryViewWatcher::attach(host.maps.as_ref());

        let inner = Rc::new(SelectorInner {
            host,
            config,
            cache,
            sync,
            watcher,
            available: RefCell::new(Vec::new()),
            active: Subject::new(None),
            sync_enabled: Subject::new(true),
            subscriptions: RefCell::new(Vec::new()),
            primary_collection: RefCell::new(None),
            destroyed: Cell::new(false),
        });
        *inner.available.borrow_mut() = inner.compute_available();
        SelectorInner::follow_primary_collection(&inner, inner.host.maps.active_map());

        let maps = Rc::clone(&inner.host.maps);
        let weak = Rc::downgrade(&inner);
        let changed = inner.watcher.changed().subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_update();
            }
        });
        let weak = Rc::downgrade(&inner);
        let activated = maps.map_activated().subscribe(move |map| {
            if let Some(inner) = weak.upgrade() {
                SelectorInner::follow_primary_collection(&inner, map.clone());
            }
        });
        let weak: Weak<SelectorInner> = Rc::downgrade(&inner);
        let added = maps.added().subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.refresh_available();
            }
        });
        let weak = Rc::downgrade(&inner);
        let removed = maps.removed().subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.refresh_available();
            }
        });
        inner
            .subscriptions
            .borrow_mut()
            .extend([changed, activated, added, removed]);

        Self { inner }
    }

    /// Kinds the user may pick right now, in display order.
    pub fn available_kinds(&self) -> Vec<SideViewKind> {
        self.inner.available.borrow().clone()
    }

    pub fn active_kind(&self) -> Option<SideViewKind> {
        self.inner.active.get()
    }

    pub fn active_subject(&self) -> &Subject<Option<SideViewKind>> {
        &self.inner.active
    }

    pub fn active_view(&self) -> Option<SideView> {
        let kind = self.active_kind()?;
        self.inner.cache.get(&SideViewKey::of_kind(kind))
    }

    pub fn sync_enabled(&self) -> bool {
        self.inner.sync_enabled.get()
    }

    pub fn sync_enabled_subject(&self) -> &Subject<bool> {
        &self.inner.sync_enabled
    }

    /// Primary viewpoint of the last sync pass.
    pub fn current_primary_viewpoint(&self) -> Option<Viewpoint> {
        self.inner.sync.last_viewpoint()
    }

    /// Pointer events of every side view built by this selector.
    pub fn router(&self) -> Signal<PointerEvent> {
        self.inner.cache.router()
    }

    pub fn cached_kinds(&self) -> Vec<SideViewKind> {
        self.inner.cache.keys().into_iter().map(|k| k.kind).collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.sync.metrics()
    }

    /// Shows the configured starting kind, else the quad view, else the
    /// first available kind.
    pub async fn initialize(&self) -> Result<Option<SideViewKind>, MultiViewError> {
        let available = self.available_kinds();
        let kind = self
            .inner
            .config
            .starting_kind()
            .filter(|k| available.contains(k))
            .or_else(|| available.iter().copied().find(|k| *k == SideViewKind::ObliqueQuad))
            .or_else(|| available.first().copied());
        let Some(kind) = kind else {
            info!("no side view available");
            return Ok(None);
        };
        self.set_active(kind).await?;
        Ok(Some(kind))
    }

    /// Shows `kind`, building it on first use.
    ///
    /// Returns `false` if `kind` was already shown. Panorama views are piloted
    /// on their own, so showing one turns synchronization off.
    pub async fn set_active(&self, kind: SideViewKind) -> Result<bool, MultiViewError> {
        let inner = &self.inner;
        if inner.active.get() == Some(kind) {
            return Ok(false);
        }
        if !inner.available.borrow().contains(&kind) {
            return Err(MultiViewError::Unavailable(kind));
        }
        let key = SideViewKey::of_kind(kind);
        let view = inner
            .cache
            .get_or_create(key)
            .await
            .ok_or(MultiViewError::Unavailable(kind))?;

        if let Some(previous) = inner.active.get() {
            if let Some(previous) = inner.cache.get(&SideViewKey::of_kind(previous)) {
                previous.deactivate();
            }
        }
        view.activate().await?;
        inner.sync.set_slots(vec![SyncSlot::new(key, None)]);
        inner.active.publish(Some(kind));
        info!(%kind, "side view shown");

        inner.sync.update().await;
        if kind.is_panorama() {
            inner.sync_enabled.publish(false);
        }
        Ok(true)
    }

    /// Turns synchronization on or off; turning it on syncs right away.
    pub async fn toggle_sync(&self) -> bool {
        let enabled = !self.inner.sync_enabled.get();
        self.inner.sync_enabled.publish(enabled);
        debug!(enabled, "side view sync toggled");
        if enabled && self.inner.active.get().is_some() {
            self.inner.sync.update().await;
        }
        enabled
    }

    /// Swaps the primary map and the side view.
    ///
    /// The side view's map kind becomes primary and takes over the side
    /// view's viewpoint; the former primary kind is shown in the side panel
    /// with the former primary viewpoint. Returns `false` if the two cannot
    /// be swapped.
    pub async fn switch_views(&self) -> Result<bool, MultiViewError> {
        let inner = &self.inner;
        let Some(SideViewKind::Map(side_kind)) = inner.active.get() else {
            return Ok(false);
        };
        let Some(primary) = inner.host.maps.active_map() else {
            return Ok(false);
        };
        let primary_side = SideViewKind::Map(primary.kind());
        if primary.kind() == side_kind || !inner.available.borrow().contains(&primary_side) {
            return Ok(false);
        }
        let Some(next_primary) = inner.host.maps.maps_of_kind(side_kind).into_iter().next() else {
            return Ok(false);
        };
        let Some(side_view) = self.active_view() else {
            return Ok(false);
        };

        let suspended = inner.sync.suspend_when_idle().await;
        let side_viewpoint = side_view.viewpoint().await;
        let primary_viewpoint = primary.viewpoint().await;

        inner.host.maps.set_active_map(&next_primary.name()).await?;
        if let Some(viewpoint) = side_viewpoint.filter(Viewpoint::is_valid) {
            next_primary.goto_viewpoint(viewpoint).await?;
        }
        self.set_active(primary_side).await?;
        if let (Some(view), Some(viewpoint)) = (self.active_view(), primary_viewpoint) {
            if let Err(err) = view.goto_viewpoint(viewpoint).await {
                warn!(%err, "side view kept its viewpoint after switch");
            }
        }
        drop(suspended);
        info!(primary = %next_primary.name(), side = %primary_side, "views switched");

        inner.sync.update().await;
        Ok(true)
    }

    /// Detaches from the host and destroys every side view. Irreversible.
    pub fn destroy(&self) -> Result<(), TeardownError> {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return Ok(());
        }
        let mut subscriptions = std::mem::take(&mut *inner.subscriptions.borrow_mut());
        subscriptions.extend(inner.primary_collection.borrow_mut().take());
        let mut failures: Vec<SignalError> = subscriptions
            .into_iter()
            .filter_map(|s| s.unsubscribe().err())
            .collect();
        for result in [inner.watcher.detach(), inner.cache.destroy_all()] {
            if let Err(err) = result {
                failures.extend(err.failures);
            }
        }
        inner.sync.reset();
        inner.active.publish(None);
        inner.active.destroy();
        inner.sync_enabled.destroy();
        TeardownError::check(failures)
    }
}

impl SelectorInner {
    fn compute_available(&self) -> Vec<SideViewKind> {
        let has_collections = !self.host.collections.all().is_empty();
        let has_panoramas = self.host.collections.has_panorama_dataset();
        self.config
            .allowed_kinds()
            .into_iter()
            .filter(|k| has_collections || !k.is_oblique())
            .filter(|k| has_panoramas || !k.is_panorama())
            .collect()
    }

    fn refresh_available(&self) {
        if self.destroyed.get() {
            return;
        }
        let available = self.compute_available();
        if let Err(err) = self.cache.retain(|k| available.contains(&k)) {
            warn!(%err, "side view teardown incomplete");
        }
        if let Some(active) = self.active.get() {
            if !available.contains(&active) {
                debug!(kind = %active, "active side view no longer available");
                self.sync.reset();
                self.active.publish(None);
            }
        }
        *self.available.borrow_mut() = available;
    }

    fn schedule_update(&self) {
        if self.destroyed.get() || self.active.get().is_none() || !self.sync_enabled.get() {
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

    /// Retargets unpinned side views whenever an oblique primary map
    /// switches collection.
    fn follow_primary_collection(this: &Rc<Self>, map: Option<Rc<dyn MapView>>) {
        if let Some(previous) = this.primary_collection.borrow_mut().take() {
            if let Err(err) = previous.unsubscribe() {
                debug!(%err, "previous primary collection listener already detached");
            }
        }
        if this.config.oblique_collection_name.is_some() {
            return;
        }
        let Some(signal) = map
            .filter(|m| m.kind() == MapKind::Oblique)
            .and_then(|m| m.collection_changed())
        else {
            return;
        };
        let weak = Rc::downgrade(this);
        let subscription = signal.subscribe(move |collection| {
            let Some(inner) = weak.upgrade() else { return };
            let cache = Rc::clone(&inner.cache);
            let collection = collection.clone();
            inner.host.spawner.spawn(
                async move {
                    cache.retarget(&collection).await;
                }
                .boxed_local(),
            );
        });
        *this.primary_collection.borrow_mut() = Some(subscription);
    }
}
