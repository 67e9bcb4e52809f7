//! The "TIME" Engine - cursor state and derived visibility.
//!
//! [`TimelineState`] is the pure half of the timeline: it owns the cursor
//! and turns it into a [`TimelineUpdate`] (three predicates plus a label).
//! It knows nothing about timers or rendering surfaces; the controller
//! wraps it for that.

use crate::error::TimelineError;
use crate::incidents::{IncidentCollection, IndexRange};
use crate::label::format_label;
use crate::predicate::PredicateSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// What moved the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorSource {
    /// User dragged the scrub control
    Slider,
    /// Autoplay tick
    Playback,
    /// Programmatic call from the host
    External,
}

/// How a requested cursor value was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOutcome {
    /// Value was inside the legal range
    Applied,
    /// Value was outside the range and clamped to the nearest bound
    Clamped { requested: i64, applied: i64 },
}

impl CursorOutcome {
    /// The cursor value that is now in effect.
    pub fn applied(&self, requested: i64) -> i64 {
        match self {
            CursorOutcome::Applied => requested,
            CursorOutcome::Clamped { applied, .. } => *applied,
        }
    }
}

/// Everything a presentation layer needs after a cursor change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineUpdate {
    pub cursor: i64,
    pub source: CursorSource,
    pub predicates: PredicateSet,
    /// `None` only when no record at or before the cursor has a usable time
    pub label: Option<String>,
}

/// Owned cursor state over a shared, read-only incident collection.
#[derive(Debug, Clone)]
pub struct TimelineState {
    collection: Arc<IncidentCollection>,
    range: IndexRange,
    cursor: i64,
    label: Option<String>,
}

impl TimelineState {
    /// Creates the state with the cursor at the start of the range.
    pub fn new(collection: Arc<IncidentCollection>) -> Result<Self, TimelineError> {
        let range = collection
            .index_range()
            .ok_or(TimelineError::EmptyCollection)?;

        let mut state = Self {
            collection,
            range,
            cursor: range.min,
            label: None,
        };
        state.label = state.derive_label(range.min);
        Ok(state)
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn range(&self) -> IndexRange {
        self.range
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn collection(&self) -> &Arc<IncidentCollection> {
        &self.collection
    }

    /// Moves the cursor, clamping out-of-range values into the range.
    pub fn set_cursor(&mut self, requested: i64, source: CursorSource) -> (CursorOutcome, TimelineUpdate) {
        let applied = self.range.clamp(requested);
        let outcome = if applied == requested {
            CursorOutcome::Applied
        } else {
            warn!(
                requested,
                applied,
                min = self.range.min,
                max = self.range.max,
                "cursor out of range, clamped"
            );
            CursorOutcome::Clamped { requested, applied }
        };

        self.apply(applied);
        (outcome, self.current(source))
    }

    /// One autoplay step: forward by one, wrapping from `max` to `min`.
    pub fn advance(&mut self) -> TimelineUpdate {
        let next = self.range.next_after(self.cursor);
        self.apply(next);
        self.current(CursorSource::Playback)
    }

    /// Snapshot of the derived state at the current cursor.
    pub fn current(&self, source: CursorSource) -> TimelineUpdate {
        TimelineUpdate {
            cursor: self.cursor,
            source,
            predicates: PredicateSet::for_cursor(self.cursor),
            label: self.label.clone(),
        }
    }

    fn apply(&mut self, cursor: i64) {
        self.cursor = cursor;
        if let Some(label) = self.derive_label(cursor) {
            self.label = Some(label);
        }
    }

    fn derive_label(&self, cursor: i64) -> Option<String> {
        let Some(record) = self.collection.label_record(cursor) else {
            debug!(cursor, "no record at or before cursor, label unchanged");
            return None;
        };
        let label = record
            .time
            .and_then(|time| format_label(&record.date, time));
        if label.is_none() {
            debug!(cursor, index = record.index, "record has no usable time, label unchanged");
        }
        label
    }
}
