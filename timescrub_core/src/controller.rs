//! Timeline Controller - publishes cursor changes and runs autoplay.
//!
//! # Architecture
//!
//! ```text
//! slider drag ──► scrub(n) ─────┐
//! host call ────► set_cursor(n) ├──► [ Mutex<Inner> ] ──► subscribers
//! ticker (50ms) ► tick ─────────┘     TimelineState       ├─ layer filters
//!                                     PlaybackState       ├─ time label
//!                                     TaskHandle          └─ scrub control
//! ```
//!
//! Every cursor mutation, including subscriber notification, runs to
//! completion under one lock, so an observer never sees predicates from
//! one cursor and a label from another. The ticker holds only a `Weak`
//! reference and is aborted when playback stops or the last controller
//! handle is dropped.

use crate::config::{LayerBindings, PlaybackConfig};
use crate::error::TimelineError;
use crate::incidents::{IncidentCollection, IndexRange};
use crate::predicate::FilterExpression;
use crate::timeline::{CursorOutcome, CursorSource, TimelineState, TimelineUpdate};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use timescrub_env::{TaskHandle, TimelineContext};
use tracing::{debug, info};

/// Autoplay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Handle returned by [`TimelineController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Host map that accepts declarative per-layer filters.
pub trait LayerSurface: Send {
    fn set_filter(&mut self, layer_id: &str, filter: &FilterExpression);
}

/// Text element showing the current time.
pub trait LabelSink: Send {
    fn set_text(&mut self, text: &str);
}

/// Scrub widget whose position follows playback.
pub trait ScrubControl: Send {
    fn set_value(&mut self, value: i64);
}

impl<T: LayerSurface> LayerSurface for Arc<Mutex<T>> {
    fn set_filter(&mut self, layer_id: &str, filter: &FilterExpression) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_filter(layer_id, filter);
    }
}

impl<T: LabelSink> LabelSink for Arc<Mutex<T>> {
    fn set_text(&mut self, text: &str) {
        self.lock().unwrap_or_else(PoisonError::into_inner).set_text(text);
    }
}

impl<T: ScrubControl> ScrubControl for Arc<Mutex<T>> {
    fn set_value(&mut self, value: i64) {
        self.lock().unwrap_or_else(PoisonError::into_inner).set_value(value);
    }
}

type Subscriber = Box<dyn FnMut(&TimelineUpdate) + Send>;

struct Inner {
    state: TimelineState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    playback: PlaybackState,

    /// Bumped on every playback transition; a tick from an older
    /// generation is discarded
    generation: u64,

    ticker: Option<TaskHandle>,
}

impl Inner {
    fn publish(&mut self, update: &TimelineUpdate) {
        debug!(
            cursor = update.cursor,
            source = ?update.source,
            label = update.label.as_deref().unwrap_or(""),
            "timeline update"
        );
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(update);
        }
    }

    fn advance(&mut self) -> TimelineUpdate {
        let update = self.state.advance();
        self.publish(&update);
        update
    }

    /// Runs one autoplay tick if `generation` is still the live one.
    fn tick_if_current(&mut self, generation: u64) -> bool {
        if self.playback != PlaybackState::Playing || self.generation != generation {
            return false;
        }
        self.advance();
        true
    }

    fn stop(&mut self) {
        self.playback = PlaybackState::Stopped;
        self.generation = self.generation.wrapping_add(1);
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

/// Owns the time cursor and keeps the map's layers, label and scrub
/// control in sync with it.
///
/// Cloning yields another handle to the same timeline.
pub struct TimelineController<Ctx: TimelineContext> {
    ctx: Arc<Ctx>,
    period: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl<Ctx: TimelineContext> Clone for TimelineController<Ctx> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            period: self.period,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Ctx: TimelineContext> TimelineController<Ctx> {
    /// Creates a stopped controller with the cursor at the first index.
    ///
    /// # Errors
    /// * `TimelineError::EmptyCollection` - no features to scrub
    /// * `TimelineError::InvalidPeriod` - `playback.period_ms` is zero
    pub fn new(
        ctx: Arc<Ctx>,
        collection: Arc<IncidentCollection>,
        playback: &PlaybackConfig,
    ) -> Result<Self, TimelineError> {
        if playback.period().is_zero() {
            return Err(TimelineError::InvalidPeriod);
        }
        let state = TimelineState::new(collection)?;
        info!(
            min = state.range().min,
            max = state.range().max,
            features = state.collection().len(),
            "timeline ready"
        );

        Ok(Self {
            ctx,
            period: playback.period(),
            inner: Arc::new(Mutex::new(Inner {
                state,
                subscribers: Vec::new(),
                next_subscription: 0,
                playback: PlaybackState::Stopped,
                generation: 0,
                ticker: None,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cursor(&self) -> i64 {
        self.lock().state.cursor()
    }

    pub fn range(&self) -> IndexRange {
        self.lock().state.range()
    }

    pub fn label(&self) -> Option<String> {
        self.lock().state.label().map(str::to_string)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.lock().playback
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Snapshot of the derived state at the current cursor.
    pub fn current(&self) -> TimelineUpdate {
        self.lock().state.current(CursorSource::External)
    }

    /// Moves the cursor on behalf of the host.
    ///
    /// Out-of-range values are clamped, never rejected.
    pub fn set_cursor(&self, n: i64) -> CursorOutcome {
        self.set_cursor_from(n, CursorSource::External)
    }

    /// Moves the cursor from a scrub-control drag. The scrub control is
    /// not echoed back to.
    pub fn scrub(&self, n: i64) -> CursorOutcome {
        self.set_cursor_from(n, CursorSource::Slider)
    }

    fn set_cursor_from(&self, n: i64, source: CursorSource) -> CursorOutcome {
        let mut inner = self.lock();
        let (outcome, update) = inner.state.set_cursor(n, source);
        inner.publish(&update);
        outcome
    }

    /// Advances one autoplay step immediately, whatever the playback state.
    pub fn tick(&self) -> TimelineUpdate {
        self.lock().advance()
    }

    /// Registers a callback for every cursor change.
    ///
    /// Callbacks run while the controller lock is held and must not call
    /// back into the controller.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TimelineUpdate) + Send + 'static,
    {
        let mut inner = self.lock();
        Self::register(&mut inner, Box::new(callback))
    }

    /// Registers a callback and immediately replays the current state to it.
    pub fn subscribe_and_replay<F>(&self, mut callback: F) -> SubscriptionId
    where
        F: FnMut(&TimelineUpdate) + Send + 'static,
    {
        let mut inner = self.lock();
        callback(&inner.state.current(CursorSource::External));
        Self::register(&mut inner, Box::new(callback))
    }

    fn register(inner: &mut Inner, callback: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push((id, callback));
        id
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Pushes every category predicate to its layer on each change,
    /// starting with the current state.
    pub fn bind_layers<S>(&self, mut surface: S, layers: LayerBindings) -> SubscriptionId
    where
        S: LayerSurface + 'static,
    {
        self.subscribe_and_replay(move |update| {
            for predicate in update.predicates.iter() {
                surface.set_filter(layers.layer_for(predicate.category), &predicate.to_expression());
            }
        })
    }

    /// Keeps a text element showing the current label.
    pub fn bind_label<L>(&self, mut sink: L) -> SubscriptionId
    where
        L: LabelSink + 'static,
    {
        self.subscribe_and_replay(move |update| {
            if let Some(label) = &update.label {
                sink.set_text(label);
            }
        })
    }

    /// Keeps the scrub control positioned at the cursor, except for moves
    /// the control made itself.
    pub fn bind_scrub<C>(&self, mut control: C) -> SubscriptionId
    where
        C: ScrubControl + 'static,
    {
        self.subscribe_and_replay(move |update| {
            if update.source != CursorSource::Slider {
                control.set_value(update.cursor);
            }
        })
    }

    /// Flips between `Stopped` and `Playing`.
    ///
    /// Entering `Playing` schedules a ticker that advances the cursor once
    /// per period. Entering `Stopped` cancels it; no tick lands afterwards.
    ///
    /// # Errors
    /// * `TimelineError::Schedule` - the ticker could not be spawned; the
    ///   controller stays `Stopped`
    pub fn toggle_playback(&self) -> Result<PlaybackState, TimelineError> {
        let mut inner = self.lock();
        match inner.playback {
            PlaybackState::Playing => {
                inner.stop();
                info!(cursor = inner.state.cursor(), "playback stopped");
            }
            PlaybackState::Stopped => {
                let generation = inner.generation.wrapping_add(1);
                let ticker = self.ctx.spawn(
                    "timeline-playback",
                    playback_loop(Arc::clone(&self.ctx), Arc::downgrade(&self.inner), self.period, generation),
                )?;
                inner.generation = generation;
                inner.ticker = Some(ticker);
                inner.playback = PlaybackState::Playing;
                info!(cursor = inner.state.cursor(), period_ms = self.period.as_millis() as u64, "playback started");
            }
        }
        Ok(inner.playback)
    }

    /// Stops playback if running. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.playback == PlaybackState::Playing || inner.ticker.is_some() {
            inner.stop();
            info!("timeline shut down");
        }
    }
}

async fn playback_loop<Ctx: TimelineContext>(
    ctx: Arc<Ctx>,
    weak: Weak<Mutex<Inner>>,
    period: Duration,
    generation: u64,
) {
    loop {
        ctx.sleep(period).await;

        let Some(inner) = weak.upgrade() else {
            break;
        };
        let ticked = {
            let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard.tick_if_current(generation)
        };
        if !ticked {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::test_support::incident;
    use crate::predicate::TimelineCategory;
    use timescrub_env::TokioContext;

    #[derive(Default)]
    struct RecordingMap {
        filters: Vec<(String, FilterExpression)>,
    }

    impl LayerSurface for RecordingMap {
        fn set_filter(&mut self, layer_id: &str, filter: &FilterExpression) {
            self.filters.push((layer_id.to_string(), filter.clone()));
        }
    }

    #[derive(Default)]
    struct RecordingText(Vec<String>);

    impl LabelSink for RecordingText {
        fn set_text(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingSlider(Vec<i64>);

    impl ScrubControl for RecordingSlider {
        fn set_value(&mut self, value: i64) {
            self.0.push(value);
        }
    }

    fn collection() -> Arc<IncidentCollection> {
        Arc::new(IncidentCollection::new(vec![
            incident(10, "fire", "May 27", Some(1200)),
            incident(11, "police", "May 27", Some(1305)),
            incident(12, "shots", "May 28", Some(0)),
            incident(14, "fire", "May 28", Some(930)),
        ]))
    }

    fn controller() -> TimelineController<TokioContext> {
        TimelineController::new(TokioContext::shared(), collection(), &PlaybackConfig::default()).unwrap()
    }

    #[test]
    fn test_bind_layers_pushes_three_filters_per_change() {
        let timeline = controller();
        let map = Arc::new(Mutex::new(RecordingMap::default()));
        timeline.bind_layers(Arc::clone(&map), LayerBindings::default());

        // Replay of the initial state
        assert_eq!(map.lock().unwrap().filters.len(), 3);

        timeline.set_cursor(12);
        let map = map.lock().unwrap();
        assert_eq!(map.filters.len(), 6);

        let layers: Vec<&str> = map.filters[3..].iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(layers, vec!["fire-layer", "police-layer", "shots-layer"]);
        assert_eq!(
            map.filters[3].1,
            crate::predicate::CategoryPredicate::new(TimelineCategory::Fire, 12).to_expression()
        );
    }

    #[test]
    fn test_label_follows_cursor() {
        let timeline = controller();
        let text = Arc::new(Mutex::new(RecordingText::default()));
        timeline.bind_label(Arc::clone(&text));

        timeline.set_cursor(11);
        timeline.set_cursor(13);
        timeline.set_cursor(14);

        assert_eq!(
            text.lock().unwrap().0,
            vec![
                "May 27 12:00 p.m.",
                "May 27 1:05 p.m.",
                "May 28 12:00 a.m.",
                "May 28 9:30 a.m.",
            ]
        );
    }

    #[test]
    fn test_scrub_is_not_echoed_to_slider() {
        let timeline = controller();
        let slider = Arc::new(Mutex::new(RecordingSlider::default()));
        timeline.bind_scrub(Arc::clone(&slider));

        timeline.scrub(12);
        timeline.tick();
        timeline.set_cursor(11);

        assert_eq!(slider.lock().unwrap().0, vec![10, 13, 11]);
    }

    #[test]
    fn test_set_cursor_idempotent_across_calls() {
        let timeline = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        timeline.subscribe(move |update| sink.lock().unwrap().push(update.clone()));

        timeline.set_cursor(12);
        timeline.set_cursor(12);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let timeline = controller();
        assert_eq!(
            timeline.set_cursor(99),
            CursorOutcome::Clamped { requested: 99, applied: 14 }
        );
        assert_eq!(timeline.cursor(), 14);
        assert_eq!(timeline.set_cursor(10), CursorOutcome::Applied);
    }

    #[test]
    fn test_tick_wraps_to_min() {
        let timeline = controller();
        timeline.set_cursor(14);
        assert_eq!(timeline.tick().cursor, 10);
    }

    #[test]
    fn test_unsubscribe() {
        let timeline = controller();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = timeline.subscribe(move |_| *sink.lock().unwrap() += 1);

        timeline.set_cursor(11);
        assert!(timeline.unsubscribe(id));
        assert!(!timeline.unsubscribe(id));
        timeline.set_cursor(12);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = TimelineController::new(
            TokioContext::shared(),
            collection(),
            &PlaybackConfig { period_ms: 0 },
        );
        assert!(matches!(result, Err(TimelineError::InvalidPeriod)));
    }

    #[test]
    fn test_toggle_without_runtime_stays_stopped() {
        let timeline = controller();
        let result = timeline.toggle_playback();
        assert!(matches!(result, Err(TimelineError::Schedule(_))));
        assert_eq!(timeline.playback_state(), PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_advances_every_period() {
        let timeline = controller();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        timeline.subscribe(move |update| {
            if update.source == CursorSource::Playback {
                sink.lock().unwrap().push(update.cursor);
            }
        });

        assert_eq!(timeline.toggle_playback().unwrap(), PlaybackState::Playing);
        tokio::time::sleep(Duration::from_millis(175)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![11, 12, 13]);
        timeline.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let timeline = controller();
        timeline.toggle_playback().unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(timeline.toggle_playback().unwrap(), PlaybackState::Stopped);
        let stopped_at = timeline.cursor();
        assert_eq!(stopped_at, 12);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(timeline.cursor(), stopped_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_wraps_from_max() {
        let timeline = controller();
        timeline.set_cursor(14);
        timeline.toggle_playback().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(timeline.cursor(), 10);
        timeline.shutdown();
        assert_eq!(timeline.playback_state(), PlaybackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_double_tick() {
        let timeline = controller();
        timeline.toggle_playback().unwrap();
        timeline.toggle_playback().unwrap();
        timeline.toggle_playback().unwrap();

        tokio::time::sleep(Duration::from_millis(110)).await;
        // Only the live ticker advances: two periods, two steps.
        assert_eq!(timeline.cursor(), 12);
        timeline.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_releases_ticker() {
        let timeline = controller();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        timeline.subscribe(move |_| *sink.lock().unwrap() += 1);

        timeline.toggle_playback().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(timeline);

        let after_drop = *count.lock().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*count.lock().unwrap(), after_drop);
    }
}
