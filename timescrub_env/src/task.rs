//! Owned handles for background tasks.

use tokio::task::JoinHandle;
use tracing::debug;

/// Owning handle for a spawned background task.
///
/// The task is aborted when the handle is cancelled or dropped, so a
/// timer cannot outlive the component that scheduled it.
#[derive(Debug)]
pub struct TaskHandle {
    /// Task name (for logging)
    name: String,

    /// Underlying tokio task, `None` once cancelled
    inner: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Wraps a tokio join handle.
    pub fn from_tokio(name: &str, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.to_string(),
            inner: Some(handle),
        }
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true while the task has not been cancelled and has not
    /// run to completion.
    pub fn is_active(&self) -> bool {
        self.inner.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Aborts the task. Calling this more than once is a no-op.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.inner.take() {
            handle.abort();
            debug!(task = %self.name, "task cancelled");
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
