use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use foundation::{CollectionId, RenderTarget};
use futures_util::future::join_all;
use runtime::{Signal, SignalError, Subscription, TeardownError};
use tracing::{debug, warn};

use crate::error::ViewError;
use crate::host::{Host, PointerEvent, ViewOptions};
use crate::kind::{MapKind, SideViewKind};
use crate::quad::ObliqueQuadView;
use crate::side_view::SideView;
use crate::tracker::DefaultCollectionTracker;

/// Cache slot of a side view.
///
/// The side panel keeps one instance per kind; the multi-view panel keeps one
/// per configured slot so that several views of the same kind can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SideViewKey {
    pub kind: SideViewKind,
    pub slot: Option<u16>,
}

impl SideViewKey {
    pub fn of_kind(kind: SideViewKind) -> Self {
        Self { kind, slot: None }
    }

    pub fn slot(kind: SideViewKind, slot: u16) -> Self {
        Self {
            kind,
            slot: Some(slot),
        }
    }

    fn view_name(&self) -> String {
        match self.slot {
            Some(slot) => format!("multi-view-map-{slot}"),
            None => format!("{}-side-view", self.kind.class_name()),
        }
    }
}

impl fmt::Display for SideViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            Some(slot) => write!(f, "{}#{slot}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Where side views without a pinned collection take theirs from.
#[derive(Clone)]
pub enum CollectionPolicy {
    /// Configured name, then the first initialized oblique map, then the
    /// starting collection, then the first known collection.
    Registry { configured: Option<String> },
    /// Whatever the tracker currently publishes.
    Tracked(DefaultCollectionTracker),
}

impl CollectionPolicy {
    fn is_configured(&self) -> bool {
        matches!(self, CollectionPolicy::Registry { configured: Some(_) })
    }
}

struct CacheEntry {
    view: SideView,
    pinned: bool,
    route: Option<Subscription>,
}

impl CacheEntry {
    /// Releases the pointer route, then deactivates and destroys the view.
    fn teardown(self) -> Vec<SignalError> {
        let mut failures = Vec::new();
        if let Some(route) = self.route {
            if let Err(err) = route.unsubscribe() {
                failures.push(err);
            }
        }
        self.view.deactivate();
        if let Err(err) = self.view.destroy() {
            failures.extend(err.failures);
        }
        failures
    }
}

/// Lazily built side views, reused across activations.
///
/// Entries live in a `BTreeMap` so iteration, and with it dispatch and
/// teardown order, is stable.
pub struct SideViewCache {
    host: Host,
    policy: CollectionPolicy,
    target: Option<RenderTarget>,
    entries: RefCell<BTreeMap<SideViewKey, CacheEntry>>,
    router: Signal<PointerEvent>,
}

impl SideViewCache {
    pub fn new(host: Host, policy: CollectionPolicy) -> Self {
        Self {
            host,
            policy,
            target: None,
            entries: RefCell::new(BTreeMap::new()),
            router: Signal::new(),
        }
    }

    /// Render target assigned to every view this cache builds.
    pub fn with_target(mut self, target: RenderTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Pointer events of every cached view.
    pub fn router(&self) -> Signal<PointerEvent> {
        self.router.clone()
    }

    pub fn get(&self, key: &SideViewKey) -> Option<SideView> {
        self.entries.borrow().get(key).map(|e| e.view.clone())
    }

    pub fn contains(&self, key: &SideViewKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<SideViewKey> {
        self.entries.borrow().keys().copied().collect()
    }

    pub fn views(&self) -> Vec<(SideViewKey, SideView)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, e)| (*k, e.view.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub async fn get_or_create(&self, key: SideViewKey) -> Option<SideView> {
        self.get_or_create_with(key, None).await
    }

    /// Returns the cached view for `key`, building it on first use.
    ///
    /// `pinned` fixes the collection of a newly built view; such views are
    /// never retargeted. Returns `None` if the view cannot be built, for
    /// example an oblique view with no collection to show.
    pub async fn get_or_create_with(
        &self,
        key: SideViewKey,
        pinned: Option<CollectionId>,
    ) -> Option<SideView> {
        let cached = self
            .entries
            .borrow()
            .get(&key)
            .map(|e| (e.view.clone(), e.pinned));
        if let Some((view, is_pinned)) = cached {
            if !is_pinned {
                self.follow_primary_collection(&key, &view).await;
            }
            return Some(view);
        }

        let is_pinned = pinned.is_some();
        let collection = match pinned {
            Some(collection) => Some(collection),
            None if key.kind.is_oblique() => match self.resolve_collection() {
                Some(collection) => Some(collection),
                None => {
                    warn!(%key, "no collection for oblique side view");
                    return None;
                }
            },
            None => None,
        };

        let view = match self.construct(&key) {
            Ok(view) => view,
            Err(err) => {
                warn!(%key, %err, "side view construction failed");
                return None;
            }
        };
        let router = self.router.clone();
        let route = view.pointer_events().subscribe(move |event| {
            router.emit(event);
        });
        view.set_layer_set(Some(self.host.maps.layer_set()));
        view.set_target(self.target.clone());

        // Inserted before the collection is applied so a concurrent request
        // for the same key gets this instance.
        self.entries.borrow_mut().insert(
            key,
            CacheEntry {
                view: view.clone(),
                pinned: is_pinned,
                route: Some(route),
            },
        );
        debug!(%key, "side view created");

        if let Some(collection) = collection {
            if let Err(err) = view.set_collection(collection).await {
                warn!(%key, %err, "side view rejected its collection");
                if let Err(err) = self.remove(&key) {
                    warn!(%key, %err, "side view teardown incomplete");
                }
                return None;
            }
        }
        Some(view)
    }

    fn construct(&self, key: &SideViewKey) -> Result<SideView, ViewError> {
        let factory = self.host.factory.as_ref();
        match key.kind {
            SideViewKind::ObliqueQuad => {
                let options = ViewOptions {
                    name: key.view_name(),
                    switch_on_edge: false,
                    settings: self.host.maps.map_options(MapKind::Oblique),
                };
                let quad = ObliqueQuadView::new(factory, &options)?;
                Ok(SideView::Quad(Rc::new(quad)))
            }
            SideViewKind::Map(kind) => {
                let options = ViewOptions {
                    settings: self.host.maps.map_options(kind),
                    ..ViewOptions::named(key.view_name())
                };
                factory.create(kind, options).map(SideView::Map)
            }
        }
    }

    /// Collection a view without a pinned one starts with.
    pub fn resolve_collection(&self) -> Option<CollectionId> {
        match &self.policy {
            CollectionPolicy::Tracked(tracker) => tracker.collection(),
            CollectionPolicy::Registry { configured } => {
                let collections = &self.host.collections;
                configured
                    .as_deref()
                    .and_then(|name| collections.get(name))
                    .or_else(|| {
                        self.host
                            .maps
                            .maps_of_kind(MapKind::Oblique)
                            .into_iter()
                            .filter(|m| m.is_initialized())
                            .find_map(|m| m.collection())
                    })
                    .or_else(|| {
                        collections
                            .starting_collection()
                            .and_then(|name| collections.get(&name))
                    })
                    .or_else(|| collections.all().into_iter().next())
            }
        }
    }

    /// Aligns a cached oblique view with an oblique primary map.
    async fn follow_primary_collection(&self, key: &SideViewKey, view: &SideView) {
        if self.policy.is_configured() || !key.kind.is_oblique() {
            return;
        }
        let Some(primary) = self.host.maps.active_map() else {
            return;
        };
        if primary.kind() != MapKind::Oblique {
            return;
        }
        let Some(collection) = primary.collection() else {
            return;
        };
        if view.collection().as_ref() == Some(&collection) {
            return;
        }
        debug!(%key, %collection, "side view follows primary collection");
        if let Err(err) = view.set_collection(collection).await {
            warn!(%key, %err, "side view collection sync failed");
        }
    }

    /// Moves every oblique view without a pinned collection to `collection`.
    ///
    /// Returns how many views now show it.
    pub async fn retarget(&self, collection: &CollectionId) -> usize {
        let targets: Vec<(SideViewKey, SideView)> = self
            .entries
            .borrow()
            .iter()
            .filter(|(k, e)| !e.pinned && k.kind.is_oblique())
            .filter(|(_, e)| e.view.collection().as_ref() != Some(collection))
            .map(|(k, e)| (*k, e.view.clone()))
            .collect();
        let results = join_all(
            targets
                .iter()
                .map(|(_, view)| view.set_collection(collection.clone())),
        )
        .await;

        let mut applied = 0;
        for ((key, _), result) in targets.iter().zip(results) {
            match result {
                Ok(()) => applied += 1,
                Err(err) => warn!(%key, %err, "side view retarget failed"),
            }
        }
        applied
    }

    /// Drops and destroys the view for `key`, if cached.
    pub fn remove(&self, key: &SideViewKey) -> Result<(), TeardownError> {
        let entry = self.entries.borrow_mut().remove(key);
        match entry {
            Some(entry) => {
                debug!(%key, "side view destroyed");
                TeardownError::check(entry.teardown())
            }
            None => Ok(()),
        }
    }

    /// Destroys every view whose kind `keep` rejects.
    pub fn retain(&self, keep: impl Fn(SideViewKind) -> bool) -> Result<(), TeardownError> {
        let rejected: Vec<SideViewKey> = self
            .entries
            .borrow()
            .keys()
            .filter(|k| !keep(k.kind))
            .copied()
            .collect();
        let mut failures = Vec::new();
        for key in rejected {
            if let Err(err) = self.remove(&key) {
                failures.extend(err.failures);
            }
        }
        TeardownError::check(failures)
    }

    /// Deactivates and destroys every view, then empties the cache.
    ///
    /// Teardown continues past failures; all of them are reported.
    pub fn destroy_all(&self) -> Result<(), TeardownError> {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        if !entries.is_empty() {
            debug!(views = entries.len(), "destroying side views");
        }
        let failures = entries
            .into_values()
            .flat_map(CacheEntry::teardown)
            .collect();
        TeardownError::check(failures)
    }
}

impl Drop for SideViewCache {
    fn drop(&mut self) {
        if let Err(err) = self.destroy_all() {
            debug!(%err, "side view cache dropped with stale listeners");
        }
    }
}

