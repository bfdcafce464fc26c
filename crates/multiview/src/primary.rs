use std::cell::RefCell;
use std::rc::{Rc, Weak};

use foundation::MapName;
use runtime::{Signal, SignalError, Subscription, TeardownError};
use tracing::debug;

use crate::host::{MapRegistry, MapView};

/// Follows the render signal of whichever map is primary.
///
/// [`changed`](PrimaryViewWatcher::changed) fires on every render tick of the
/// primary map and once whenever another map becomes primary.
pub struct PrimaryViewWatcher {
    inner: Rc<WatcherInner>,
}

struct WatcherInner {
    changed: Signal<()>,
    primary: RefCell<Option<MapName>>,
    render: RefCell<Option<Subscription>>,
    switch: RefCell<Option<Subscription>>,
}

impl PrimaryViewWatcher {
    pub fn attach(maps: &dyn MapRegistry) -> Self {
        let inner = Rc::new(WatcherInner {
            changed: Signal::new(),
            primary: RefCell::new(None),
            render: RefCell::new(None),
            switch: RefCell::new(None),
        });
        inner.wire(maps.active_map());

        let weak: Weak<WatcherInner> = Rc::downgrade(&inner);
        let switch = maps.map_activated().subscribe(move |map| {
            let Some(inner) = weak.upgrade() else { return };
            inner.wire(map.clone());
            inner.changed.emit(&());
        });
        *inner.switch.borrow_mut() = Some(switch);
        Self { inner }
    }

    pub fn changed(&self) -> Signal<()> {
        self.inner.changed.clone()
    }

    /// Map whose render signal is followed.
    pub fn primary(&self) -> Option<MapName> {
        self.inner.primary.borrow().clone()
    }

    /// Stops following the registry and the primary map.
    pub fn detach(&self) -> Result<(), TeardownError> {
        let mut failures: Vec<SignalError> = Vec::new();
        let subscriptions = [
            self.inner.switch.borrow_mut().take(),
            self.inner.render.borrow_mut().take(),
        ];
        for subscription in subscriptions.into_iter().flatten() {
            if let Err(err) = subscription.unsubscribe() {
                failures.push(err);
            }
        }
        self.inner.primary.borrow_mut().take();
        self.inner.changed.destroy();
        TeardownError::check(failures)
    }
}

impl WatcherInner {
    fn wire(&self, map: Option<Rc<dyn MapView>>) {
        if let Some(previous) = self.render.borrow_mut().take() {
            if let Err(err) = previous.unsubscribe() {
                debug!(%err, "previous primary map already detached");
            }
        }
        *self.primary.borrow_mut() = map.as_ref().map(|m| m.name());
        let Some(map) = map else { return };

        let changed = self.changed.clone();
        let render = map.render_changed().subscribe(move |_| {
            changed.emit(&());
        });
        *self.render.borrow_mut() = Some(render);
        debug!(map = %map.name(), "following primary map");
    }
}
