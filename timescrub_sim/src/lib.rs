//! timescrub deterministic playback harness
//!
//! Runs the timeline controller against a virtual clock so autoplay can be
//! replayed tick for tick, and renders small-multiple panels to SVG.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    PlaybackRunner                    │
//! │  ┌────────────┐   advance_time   ┌────────────────┐  │
//! │  │ SimContext │ ◄─────────────── │  step / live   │  │
//! │  └─────┬──────┘                  └───────┬────────┘  │
//! │        │ sleep / spawn                   │ frames    │
//! │  ┌─────▼──────────────────────┐   ┌──────▼────────┐  │
//! │  │ TimelineController         │──►│ PlaybackExport│  │
//! │  └────────────────────────────┘   └───────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use timescrub_sim::{synthetic, PlaybackRunner, SimContext};
//!
//! let ctx = SimContext::shared(42);
//! let data = synthetic::generate(42, &Default::default());
//! let mut runner = PlaybackRunner::new(ctx, Arc::new(data.incidents), &Default::default())?;
//! let frames = runner.run(100);
//! ```

mod context;
mod error;
mod exporter;
pub mod panels;
mod runner;
pub mod synthetic;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{PanelSummary, PlaybackExport, PlaybackFrame};
pub use runner::PlaybackRunner;
