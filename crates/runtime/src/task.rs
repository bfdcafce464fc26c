use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures_util::future::{LocalBoxFuture, join_all};
use tracing::{trace, warn};

/// A unit of deferred work, run on the current thread.
pub type LocalTask = LocalBoxFuture<'static, ()>;

/// Hands work triggered from synchronous signal listeners to an executor.
pub trait Spawner {
    fn spawn(&self, task: LocalTask);
}

/// Spawns onto the enclosing `tokio::task::LocalSet`.
///
/// Each task is joined by a watcher that logs and counts tasks that panicked
/// or were cancelled. Panics if used outside a `LocalSet`, like
/// `tokio::task::spawn_local`.
#[derive(Debug, Default, Clone)]
pub struct TokioSpawner {
    failed: Rc<Cell<usize>>,
}

impl TokioSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawned tasks that did not run to completion.
    pub fn failed_tasks(&self) -> usize {
        self.failed.get()
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, task: LocalTask) {
        let handle = tokio::task::spawn_local(task);
        let failed = Rc::clone(&self.failed);
        tokio::task::spawn_local(async move {
            if let Err(err) = handle.await {
                failed.set(failed.get() + 1);
                warn!(%err, "spawned task failed");
            }
        });
    }
}

/// Deterministic task queue drained explicitly by the host.
///
/// Tasks are collected in FIFO order and run by [`TaskQueue::run_until_idle`];
/// each drained batch is joined concurrently, so tasks queued together
/// interleave at their await points exactly like independently spawned tasks.
#[derive(Clone, Default)]
pub struct TaskQueue {
    pending: Rc<RefCell<VecDeque<LocalTask>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Runs queued tasks, including tasks they queue, until none remain.
    ///
    /// Returns the number of tasks that ran.
    pub async fn run_until_idle(&self) -> usize {
        let mut ran = 0usize;
        loop {
            let batch: Vec<LocalTask> = self.pending.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            ran += batch.len();
            trace!(tasks = batch.len(), "draining task batch");
            join_all(batch).await;
        }
        ran
    }
}

impl Spawner for TaskQueue {
    fn spawn(&self, task: LocalTask) {
        self.pending.borrow_mut().push_back(task);
    }
}
