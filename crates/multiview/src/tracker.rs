use std::cell::RefCell;
use std::rc::{Rc, Weak};

use foundation::{CollectionId, MapName};
use runtime::{SignalError, Subject, Subscription, TeardownError};
use tracing::debug;

use crate::host::{MapRegistry, MapView};
use crate::kind::MapKind;

/// Keeps the "default collection" in step with the host's maps.
///
/// The source is a map of the tracked kind:
/// - on start, the first such map in registry order;
/// - when one is added, the newly added map;
/// - when the source is removed, the first remaining one in registry order.
///
/// With no source the default collection is absent and [`disabled`] is `true`.
///
/// [`disabled`]: DefaultCollectionTracker::disabled
#[derive(Clone)]
pub struct DefaultCollectionTracker {
    inner: Rc<TrackerInner>,
}

struct TrackerInner {
    registry: Rc<dyn MapRegistry>,
    kind: MapKind,
    collection: Subject<Option<CollectionId>>,
    disabled: Subject<bool>,
    source: RefCell<Option<TrackedSource>>,
    registry_subscriptions: RefCell<Vec<Subscription>>,
}

struct TrackedSource {
    map: MapName,
    subscription: Option<Subscription>,
}

impl DefaultCollectionTracker {
    pub fn start(registry: Rc<dyn MapRegistry>, kind: MapKind) -> Self {
        let inner = Rc::new(TrackerInner {
            registry: Rc::clone(&registry),
            kind,
            collection: Subject::new(None),
            disabled: Subject::new(true),
            source: RefCell::new(None),
            registry_subscriptions: RefCell::new(Vec::new()),
        });
        TrackerInner::adopt_first(&inner);

        let weak = Rc::downgrade(&inner);
        let added = registry.added().subscribe(move |map| {
            let Some(inner) = weak.upgrade() else { return };
            if map.kind() == inner.kind {
                TrackerInner::adopt(&inner, Some(Rc::clone(map)));
            }
        });
        let weak = Rc::downgrade(&inner);
        let removed = registry.removed().subscribe(move |map| {
            let Some(inner) = weak.upgrade() else { return };
            if inner.source_name().as_ref() == Some(&map.name()) {
                debug!(map = %map.name(), "default collection source removed");
                TrackerInner::adopt_first(&inner);
            }
        });
        inner
            .registry_subscriptions
            .borrow_mut()
            .extend([added, removed]);

        Self { inner }
    }

    pub fn collection(&self) -> Option<CollectionId> {
        self.inner.collection.get()
    }

    pub fn disabled(&self) -> bool {
        self.inner.disabled.get()
    }

    pub fn collection_subject(&self) -> &Subject<Option<CollectionId>> {
        &self.inner.collection
    }

    pub fn disabled_subject(&self) -> &Subject<bool> {
        &self.inner.disabled
    }

    /// Map currently supplying the default collection.
    pub fn source(&self) -> Option<MapName> {
        self.inner.source_name()
    }

    /// Detaches from the registry and the source map. Irreversible.
    pub fn destroy(&self) -> Result<(), TeardownError> {
        let mut failures: Vec<SignalError> = Vec::new();
        let registry_subscriptions = std::mem::take(&mut *self.inner.registry_subscriptions.borrow_mut());
        if let Err(err) = runtime::teardown(registry_subscriptions) {
            failures.extend(err.failures);
        }
        let source = self.inner.source.borrow_mut().take();
        if let Some(subscription) = source.and_then(|s| s.subscription) {
            if let Err(err) = subscription.unsubscribe() {
                failures.push(err);
            }
        }
        self.inner.collection.destroy();
        self.inner.disabled.destroy();
        TeardownError::check(failures)
    }
}

impl TrackerInner {
    fn source_name(&self) -> Option<MapName> {
        self.source.borrow().as_ref().map(|s| s.map.clone())
    }

    fn adopt_first(this: &Rc<Self>) {
        let first = this.registry.maps_of_kind(this.kind).into_iter().next();
        Self::adopt(this, first);
    }

    fn adopt(this: &Rc<Self>, map: Option<Rc<dyn MapView>>) {
        this.release_source();
        let Some(map) = map else {
            this.publish(None);
            return;
        };

        let weak: Weak<Self> = Rc::downgrade(this);
        let subscription = map.collection_changed().map(|signal| {
            signal.subscribe(move |collection| {
                if let Some(inner) = weak.upgrade() {
                    inner.publish(Some(collection.clone()));
                }
            })
        });
        *this.source.borrow_mut() = Some(TrackedSource {
            map: map.name(),
            subscription,
        });
        debug!(map = %map.name(), "default collection source adopted");
        this.publish(map.collection());
    }

    fn release_source(&self) {
        let previous = self.source.borrow_mut().take();
        if let Some(subscription) = previous.and_then(|s| s.subscription) {
            // The map may already be gone; its listeners went with it.
            if let Err(err) = subscription.unsubscribe() {
                debug!(%err, "default collection source already detached");
            }
        }
    }

    fn publish(&self, collection: Option<CollectionId>) {
        let disabled = collection.is_none();
        self.collection.publish(collection);
        self.disabled.publish(disabled);
    }
}
