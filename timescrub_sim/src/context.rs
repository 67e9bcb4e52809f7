//! Simulation context implementing TimelineContext for deterministic playback.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use timescrub_env::{EnvError, TaskHandle, TimelineContext};
use tokio::sync::Notify;

/// Simulation context backed by a virtual clock.
///
/// This implements `TimelineContext` using:
/// - A virtual clock that only moves when [`SimContext::advance_time`] is called
/// - Sleeps that complete once virtual time reaches their deadline
/// - Seed-derived RNG streams for synthetic data
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Wakes sleepers whenever virtual time moves
    clock_moved: Arc<Notify>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            clock_moved: Arc::new(Notify::new()),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    fn clock(&self) -> MutexGuard<'_, u64> {
        self.virtual_time_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        {
            let mut time = self.clock();
            *time = time.saturating_add(duration.as_nanos() as u64);
        }
        self.clock_moved.notify_waiters();
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        *self.clock() = time_ns;
        self.clock_moved.notify_waiters();
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.clock()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives an independent RNG stream from the master seed.
    pub fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            clock_moved: Arc::clone(&self.clock_moved),
        }
    }
}

#[async_trait]
impl TimelineContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        let deadline = self.time_ns().saturating_add(duration.as_nanos() as u64);
        loop {
            // Register before checking so an advance in between is not missed
            let moved = self.clock_moved.notified();
            if self.time_ns() >= deadline {
                return;
            }
            moved.await;
        }
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
