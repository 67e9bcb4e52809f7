//! Production implementation of TimelineContext using Tokio.

use crate::{EnvError, TaskHandle, TimelineContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Production context backed by the Tokio timer wheel.
///
/// Uses `tokio::time::Instant` so that paused test time
/// (`#[tokio::test(start_paused = true)]`) drives `now()` as well.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimelineContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> Result<TaskHandle, EnvError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| EnvError::no_runtime(name))?;
        Ok(TaskHandle::from_tokio(name, runtime.spawn(future)))
    }
}
