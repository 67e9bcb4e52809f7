//! Core environment context trait for the timeline engine.

use crate::error::EnvError;
use crate::task::TaskHandle;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts timers and task spawning so the timeline
/// controller can run under a real runtime or a deterministic harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` (in `timescrub_sim`) - virtual clock
#[async_trait]
pub trait TimelineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task and returns a handle that owns it.
    ///
    /// Dropping or cancelling the handle stops the task at its next
    /// suspension point.
    ///
    /// # Errors
    /// * `EnvError::NoRuntime` - there is no executor to run the task on
    fn spawn<F>(&self, name: &str, future: F) -> Result<TaskHandle, EnvError>
    where
        F: Future<Output = ()> + Send + 'static;
}
