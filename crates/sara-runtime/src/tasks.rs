//! [`BackgroundTasks`] – detached task spawning with an in-flight count.
//!
//! Tasks are spawned on the Tokio runtime and their `JoinHandle` is dropped:
//! nobody waits on an individual task, and nothing cancels one.  The tracker
//! only lets the process wait, before exiting, until every task has finished
//! so their memory writes reach disk.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when the task ends, including by panic.
struct Completion(Arc<Inner>);

impl Drop for Completion {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Cheap-to-clone handle over the set of running background tasks.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` detached.  Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let completion = Completion(self.inner.clone());
        // Detached: the handle is dropped on purpose.
        drop(tokio::spawn(async move {
            let _completion = completion;
            task.await;
        }));
    }

    /// Number of tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// [`wait_idle`][Self::wait_idle] bounded by `timeout`.  Returns `false`
    /// if tasks were still running when it expired.
    pub async fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_idle()).await.is_ok()
    }
}
