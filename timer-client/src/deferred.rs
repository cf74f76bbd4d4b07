//! Single-slot background tasks.
//!
//! [`TaskSlot`] holds at most one running task and aborts it when replaced,
//! cancelled or dropped. [`DeferredTask`] builds a debounce on top: arming it
//! restarts the quiet period, and only the last action armed in a burst runs.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Holds at most one background task.
#[derive(Debug, Default)]
pub struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a task, aborting the one it replaces.
    pub fn set(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.handle = Some(handle);
    }

    /// Abort the held task, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a task is held and still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A debounced action.
///
/// Once the delay elapses the action is spawned as its own task, so
/// re-arming or cancelling never interrupts an action already underway.
#[derive(Debug)]
pub struct DeferredTask {
    delay: Duration,
    slot: TaskSlot,
}

impl DeferredTask {
    /// Create an unarmed task with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: TaskSlot::new(),
        }
    }

    /// Run `action` after the quiet period, replacing any pending action.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        self.slot.set(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action);
        }));
    }

    /// Drop the pending action, if any.
    pub fn cancel(&mut self) {
        self.slot.cancel();
    }

    /// Whether an action is waiting for its quiet period to end.
    pub fn is_pending(&self) -> bool {
        self.slot.is_active()
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
