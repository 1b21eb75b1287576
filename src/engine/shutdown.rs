//! Cooperative cancellation and the completion barrier.
//!
//! The cancellation token is one-way: once cancelled it never resets. The
//! task tracker counts every task started through it until that task
//! finishes, whatever path it exits by.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Error, Result};

/// Cancellation signal plus completion barrier shared by the dispatch loop
/// and its tasks.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinator whose token is also cancelled when `parent` is.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Tasks started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel, then wait up to `deadline` for every tracked task to finish.
    ///
    /// On timeout the remaining tasks keep running unsupervised.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        self.cancel.cancel();
        self.tracker.close();

        tokio::time::timeout(deadline, self.tracker.wait())
            .await
            .map_err(|_| Error::ShutdownTimeout(deadline))
    }
}
