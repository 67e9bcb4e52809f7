//! Playback runner - drives a timeline controller on virtual time.
//!
//! Two modes:
//! - [`PlaybackRunner::run`] steps the clock and calls `tick()` directly,
//!   with no background task at all.
//! - [`PlaybackRunner::run_live`] starts real autoplay on the
//!   [`SimContext`] and lets the spawned ticker fire as virtual time passes.
//!
//! Both produce the same frames for the same input.

use crate::context::SimContext;
use crate::error::SimError;
use crate::exporter::{PlaybackExport, PlaybackFrame};
use std::sync::{Arc, Mutex, PoisonError};
use timescrub_core::{
    CursorOutcome, IncidentCollection, PlaybackState, TimelineController, TimelineUpdate, TimescrubConfig,
};
use timescrub_env::TimelineContext;
use tracing::{debug, info, warn};

/// How many scheduler yields to allow for one tick to land.
const MAX_YIELDS_PER_TICK: usize = 64;

/// Runs playback over a shared incident collection.
pub struct PlaybackRunner {
    ctx: Arc<SimContext>,
    controller: TimelineController<SimContext>,
    collection: Arc<IncidentCollection>,
    tick: u64,
}

impl PlaybackRunner {
    pub fn new(
        ctx: Arc<SimContext>,
        collection: Arc<IncidentCollection>,
        config: &TimescrubConfig,
    ) -> Result<Self, SimError> {
        let controller =
            TimelineController::new(Arc::clone(&ctx), Arc::clone(&collection), &config.playback)?;
        Ok(Self {
            ctx,
            controller,
            collection,
            tick: 0,
        })
    }

    pub fn controller(&self) -> &TimelineController<SimContext> {
        &self.controller
    }

    /// Moves the cursor before playback starts.
    pub fn start_at(&self, cursor: i64) -> CursorOutcome {
        self.controller.set_cursor(cursor)
    }

    /// Frame describing the current state without advancing.
    pub fn snapshot(&self) -> PlaybackFrame {
        self.frame(&self.controller.current(), false)
    }

    /// Advances virtual time by one period and ticks once.
    pub fn step(&mut self) -> PlaybackFrame {
        let before = self.controller.cursor();
        self.ctx.advance_time(self.controller.period());
        let update = self.controller.tick();
        self.tick += 1;
        self.frame(&update, update.cursor < before)
    }

    /// Steps `ticks` times, returning the initial frame plus one per tick.
    pub fn run(&mut self, ticks: u64) -> Vec<PlaybackFrame> {
        let mut frames = Vec::with_capacity(ticks as usize + 1);
        frames.push(self.snapshot());
        for _ in 0..ticks {
            let frame = self.step();
            if frame.wrapped {
                debug!(tick = frame.tick, cursor = frame.cursor, "playback wrapped");
            }
            frames.push(frame);
        }
        info!(ticks, final_cursor = self.controller.cursor(), "playback run complete");
        frames
    }

    /// Runs `ticks` ticks through the controller's own ticker task.
    ///
    /// Must be called inside a tokio runtime. Playback is stopped before
    /// returning, including on error.
    pub async fn run_live(&mut self, ticks: u64) -> Result<Vec<PlaybackFrame>, SimError> {
        let updates: Arc<Mutex<Vec<TimelineUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        let subscription = self.controller.subscribe(move |update| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(update.clone());
        });

        let mut frames = vec![self.snapshot()];
        let result = self.drive_ticker(ticks, &updates, &mut frames).await;

        if self.controller.playback_state() == PlaybackState::Playing {
            self.controller.toggle_playback()?;
        }
        self.controller.unsubscribe(subscription);
        result.map(|_| frames)
    }

    async fn drive_ticker(
        &mut self,
        ticks: u64,
        updates: &Mutex<Vec<TimelineUpdate>>,
        frames: &mut Vec<PlaybackFrame>,
    ) -> Result<(), SimError> {
        self.controller.toggle_playback()?;
        // Let the ticker reach its first sleep before time moves
        for _ in 0..MAX_YIELDS_PER_TICK {
            tokio::task::yield_now().await;
        }

        let period = self.controller.period();
        for n in 0..ticks {
            let before = frames.last().map(|f| f.cursor).unwrap_or(self.controller.cursor());
            self.ctx.advance_time(period);

            let update = wait_for_update(updates, n as usize).await.ok_or_else(|| {
                warn!(tick = n + 1, now = ?self.ctx.now(), "ticker did not fire");
                SimError::Stalled(n + 1)
            })?;
            self.tick += 1;
            frames.push(self.frame(&update, update.cursor < before));
        }
        Ok(())
    }

    fn frame(&self, update: &TimelineUpdate, wrapped: bool) -> PlaybackFrame {
        PlaybackFrame {
            tick: self.tick,
            time_ms: self.ctx.now().as_millis() as u64,
            cursor: update.cursor,
            label: update.label.clone(),
            visible: update.predicates.count_matches(&self.collection),
            wrapped,
        }
    }

    /// Builds an export from frames produced by this runner.
    pub fn export(&self, source: &str, frames: Vec<PlaybackFrame>) -> PlaybackExport {
        let range = self.controller.range();
        let mut export = PlaybackExport::new(
            source,
            self.ctx.seed(),
            self.controller.period().as_millis() as u64,
            range.min,
            range.max,
        );
        for frame in frames {
            export.add_frame(frame);
        }
        export
    }
}

impl Drop for PlaybackRunner {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}

async fn wait_for_update(updates: &Mutex<Vec<TimelineUpdate>>, position: usize) -> Option<TimelineUpdate> {
    for _ in 0..MAX_YIELDS_PER_TICK {
        let landed = updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(position)
            .cloned();
        if landed.is_some() {
            return landed;
        }
        tokio::task::yield_now().await;
    }
    None
}
