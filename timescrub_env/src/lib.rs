//! timescrub Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the timeline engine run
//! against **real timers** (tokio) or a **virtual clock** (the sim harness).
//!
//! # Core Concept
//!
//! The only recurring asynchronous trigger in the engine is the playback
//! tick. Everything that depends on time goes through [`TimelineContext`]:
//! - Time (`now()`, `sleep()`)
//! - Background tasks (`spawn()`), returned as a cancellable [`TaskHandle`]
//!
//! # Example
//!
//! ```ignore
//! use timescrub_env::{TimelineContext, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! let mut handle = ctx.spawn("playback", async move {
//!     loop {
//!         ctx.sleep(Duration::from_millis(50)).await;
//!         tick();
//!     }
//! })?;
//!
//! // Stopping playback must release the timer.
//! handle.cancel();
//! ```

mod context;
mod error;
mod task;
mod tokio_impl;

pub use context::TimelineContext;
pub use error::EnvError;
pub use task::TaskHandle;
pub use tokio_impl::TokioContext;
