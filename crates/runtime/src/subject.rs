use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::signal::{Signal, Subscription};

/// A published value plus the signal raised whenever it changes.
///
/// Recomputation is push-based: the owner calls [`Subject::publish`],
/// subscribers never pull.
pub struct Subject<T> {
    value: Rc<RefCell<T>>,
    changed: Signal<T>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            changed: self.changed.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subject").field(&*self.value.borrow()).finish()
    }
}

impl<T: Clone + PartialEq + 'static> Subject<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(initial)),
            changed: Signal::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Stores `value` and notifies subscribers if it differs from the current one.
    ///
    /// Returns `true` if subscribers were notified.
    pub fn publish(&self, value: T) -> bool {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.changed.emit(&value);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.changed.subscribe(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.changed.listener_count()
    }

    pub fn destroy(&self) {
        self.changed.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Subject;

    #[test]
    fn publishes_only_changes() {
        let subject = Subject::new(None::<u8>);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let seen = Rc::clone(&seen);
            subject.subscribe(move |v| seen.borrow_mut().push(*v))
        };
        assert!(subject.publish(Some(1)));
        assert!(!subject.publish(Some(1)));
        assert!(subject.publish(None));
        assert_eq!(*seen.borrow(), vec![Some(1), None]);
        assert_eq!(subject.get(), None);
        sub.unsubscribe().unwrap();
    }

    #[test]
    fn subscribers_observe_the_new_value() {
        let subject = Subject::new(0u32);
        let reader = subject.clone();
        let observed = Rc::new(RefCell::new(None));
        let sub = {
            let observed = Rc::clone(&observed);
            subject.subscribe(move |_| *observed.borrow_mut() = Some(reader.get()))
        };
        subject.publish(5);
        assert_eq!(*observed.borrow(), Some(5));
        sub.unsubscribe().unwrap();
    }
}
