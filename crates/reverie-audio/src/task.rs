//! Cancellation tokens and handles for cooperative tasks.
//!
//! Fades and environment event loops are not threads. They are state
//! machines advanced by the host's tick, and each one is observed and
//! cancelled through a [`TaskHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reverie_common::TaskId;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Observer and cancel switch for one task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    token: CancellationToken,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a handle for a new running task.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: TaskId::next(),
            token: CancellationToken::new(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a handle for a task that completed synchronously.
    #[must_use]
    pub fn completed() -> Self {
        let handle = Self::new();
        handle.finish();
        handle
    }

    /// Task id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Stop the task. Safe on finished or already-cancelled tasks.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether `cancel` was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task has stopped running, by completion or cancellation.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether the task will still make progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.is_finished() && !self.is_cancelled()
    }

    pub(crate) fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}
