use std::cell::{Cell, RefCell};
use std::future::poll_fn;
use std::rc::Rc;
use std::task::{Poll, Waker};

/// Single-slot "in flight" flag with drop-on-contention semantics.
///
/// This is advisory, not a queue: a caller that finds the guard busy is
/// expected to skip its work entirely. The flag is cleared when the
/// [`InFlightToken`] is dropped, so every exit path of the guarded
/// operation (early return, error, panic unwind) releases it.
///
/// A caller that must not skip uses [`InFlightGuard::enter`] to wait for
/// the current holder instead.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    state: Rc<GuardState>,
}

#[derive(Debug, Default)]
struct GuardState {
    busy: Cell<bool>,
    waiters: RefCell<Vec<Waker>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if another holder is in flight.
    pub fn try_enter(&self) -> Option<InFlightToken> {
        if self.state.busy.replace(true) {
            return None;
        }
        Some(InFlightToken {
            state: Rc::clone(&self.state),
        })
    }

    /// Waits until the current holder drops its token, then enters.
    pub async fn enter(&self) -> InFlightToken {
        poll_fn(|cx| match self.try_enter() {
            Some(token) => Poll::Ready(token),
            None => {
                self.state.waiters.borrow_mut().push(cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy.get()
    }
}

#[derive(Debug)]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct InFlightToken {
    state: Rc<GuardState>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.state.busy.set(false);
        let waiters = std::mem::take(&mut *self.state.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::InFlightGuard;

    #[test]
    fn second_entry_is_refused_while_in_flight() {
        let guard = InFlightGuard::new();
        let token = guard.try_enter();
        assert!(token.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_enter().is_none());
        drop(token);
        assert!(!guard.is_busy());
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn clones_share_the_flag() {
        let guard = InFlightGuard::new();
        let other = guard.clone();
        let _token = guard.try_enter().unwrap();
        assert!(other.try_enter().is_none());
    }

    #[test]
    fn flag_clears_on_early_return() {
        fn guarded(guard: &InFlightGuard, fail: bool) -> Result<(), &'static str> {
            let _token = guard.try_enter().ok_or("busy")?;
            if fail {
                return Err("failed");
            }
            Ok(())
        }
        let guard = InFlightGuard::new();
        assert_eq!(guarded(&guard, true), Err("failed"));
        assert!(!guard.is_busy());
        assert_eq!(guarded(&guard, false), Ok(()));
    }

    #[tokio::test]
    async fn enter_waits_for_the_holder() {
        let guard = InFlightGuard::new();
        let log = RefCell::new(Vec::new());
        let holder = async {
            let token = guard.try_enter().unwrap();
            tokio::task::yield_now().await;
            log.borrow_mut().push("holder");
            drop(token);
        };
        let waiter = async {
            let _token = guard.enter().await;
            log.borrow_mut().push("waiter");
            assert!(guard.is_busy());
        };
        tokio::join!(holder, waiter);
        assert_eq!(*log.borrow(), vec!["holder", "waiter"]);
        assert!(!guard.is_busy());
    }
}
