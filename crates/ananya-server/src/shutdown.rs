//! Graceful shutdown: one `CancellationToken` and the tasks that watch it.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long tasks get to finish after cancellation.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the process-wide cancellation token and the long-lived tasks.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// New coordinator with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on shutdown.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a task that is awaited during shutdown.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "spawning tracked task");
        self.tasks.lock().push((name, tokio::spawn(task)));
    }

    /// Number of tracked tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancel the token and wait up to `timeout` for tracked tasks, aborting stragglers.
    pub async fn shutdown(&self, timeout: Duration) {
        self.token.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!(tasks = tasks.len(), timeout_secs = timeout.as_secs(), "draining tasks");

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, mut handle) in tasks {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(task = name, "task did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}
