//! Single-threaded observer primitive.
//!
//! A [`Signal`] is a cheap, clonable handle onto a listener list. Every
//! subscription hands back a [`Subscription`] which must be released
//! explicitly; dropping it leaves the listener attached.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("signal was dropped before the listener was released")]
    Dropped,
    #[error("signal was destroyed before the listener was released")]
    Destroyed,
    #[error("listener {0:?} is not attached")]
    UnknownListener(ListenerId),
}

/// Every failure of a best-effort teardown, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} listener(s) failed to detach: {}", .failures.len(), summarize(.failures))]
pub struct TeardownError {
    pub failures: Vec<SignalError>,
}

fn summarize(failures: &[SignalError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl TeardownError {
    /// `Ok` when nothing failed.
    pub fn check(failures: Vec<SignalError>) -> Result<(), TeardownError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

struct SignalInner<T> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<T>)>,
    destroyed: bool,
}

trait Detach {
    fn detach(&self, id: ListenerId) -> Result<(), SignalError>;
}

impl<T> Detach for RefCell<SignalInner<T>> {
    fn detach(&self, id: ListenerId) -> Result<(), SignalError> {
        let mut inner = self.borrow_mut();
        if inner.destroyed {
            return Err(SignalError::Destroyed);
        }
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        if inner.listeners.len() == before {
            return Err(SignalError::UnknownListener(id));
        }
        Ok(())
    }
}

pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                next_id: 0,
                listeners: Vec::new(),
                destroyed: false,
            })),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Signal")
            .field("listeners", &inner.listeners.len())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `listener`. On a destroyed signal the listener is never called.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;
            if !inner.destroyed {
                inner.listeners.push((id, Rc::new(listener)));
            }
            id
        };
        let target: Weak<dyn Detach> = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription { id, target }
    }

    /// Calls every listener attached at the time of the call.
    ///
    /// Listeners may subscribe or unsubscribe (themselves included) while
    /// being called; changes take effect from the next emission.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in &snapshot {
            listener(value);
        }
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Releases all listeners permanently.
    pub fn destroy(&self) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            inner.destroyed = true;
            std::mem::take(&mut inner.listeners)
        };
        drop(released);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }
}

/// Handle to one attached listener.
#[must_use = "a subscription must be released with `unsubscribe`"]
pub struct Subscription {
    id: ListenerId,
    target: Weak<dyn Detach>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unsubscribe(self) -> Result<(), SignalError> {
        match self.target.upgrade() {
            Some(target) => target.detach(self.id),
            None => Err(SignalError::Dropped),
        }
    }
}

/// Releases every subscription, even when some of them fail.
pub fn teardown(subscriptions: impl IntoIterator<Item = Subscription>) -> Result<(), TeardownError> {
    let failures = subscriptions
        .into_iter()
        .filter_map(|s| s.unsubscribe().err())
        .collect();
    TeardownError::check(failures)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{Signal, SignalError, teardown};

    #[test]
    fn emits_to_all_listeners_in_subscription_order() {
        let signal = Signal::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |v| seen.borrow_mut().push(("a", *v)))
        };
        let b = {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |v| seen.borrow_mut().push(("b", *v)))
        };
        assert_eq!(signal.emit(&7), 2);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
        a.unsubscribe().unwrap();
        b.unsubscribe().unwrap();
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_emit() {
        let signal = Signal::<()>::new();
        let hits = Rc::new(Cell::new(0));
        let slot = Rc::new(RefCell::new(None));
        let sub = {
            let hits = Rc::clone(&hits);
            let slot = Rc::clone(&slot);
            signal.subscribe(move |_| {
                hits.set(hits.get() + 1);
                if let Some(sub) = slot.borrow_mut().take() {
                    let _ = super::Subscription::unsubscribe(sub);
                }
            })
        };
        *slot.borrow_mut() = Some(sub);
        signal.emit(&());
        signal.emit(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn releasing_after_destroy_reports_failure() {
        let signal = Signal::<u8>::new();
        let sub = signal.subscribe(|_| {});
        signal.destroy();
        assert_eq!(sub.unsubscribe(), Err(SignalError::Destroyed));
        assert_eq!(signal.emit(&1), 0);
    }

    #[test]
    fn releasing_after_drop_reports_failure() {
        let signal = Signal::<u8>::new();
        let sub = signal.subscribe(|_| {});
        drop(signal);
        assert_eq!(sub.unsubscribe(), Err(SignalError::Dropped));
    }

    #[test]
    fn teardown_releases_everything_before_reporting() {
        let alive = Signal::<u8>::new();
        let dead = Signal::<u8>::new();
        let subs = vec![
            dead.subscribe(|_| {}),
            alive.subscribe(|_| {}),
            alive.subscribe(|_| {}),
        ];
        dead.destroy();
        let err = teardown(subs).unwrap_err();
        assert_eq!(err.failures, vec![SignalError::Destroyed]);
        assert_eq!(alive.listener_count(), 0);
    }
}
