//! Human-readable time label for the cursor.
//!
//! Incident times are stored as HHMM-like integers (`2130`, `905`, `0`).
//! The label splits the decimal text, not the number: the hour is every
//! digit except the last two, the minute is the last two digits (or the
//! whole text when shorter than three digits).
//!
//! Only a minute of exactly `"0"` is padded to `"00"`. A one-digit minute
//! can only come from times `1..=9` and stays unpadded (`5` renders as
//! `12:5 a.m.`). Published graphics carry that output, so it is kept.

use crate::incidents::DateKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half of the 12-hour clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    pub fn suffix(&self) -> &'static str {
        match self {
            Meridiem::Am => "a.m.",
            Meridiem::Pm => "p.m.",
        }
    }
}

/// A decoded 12-hour clock reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    /// 1..=12 for well-formed input
    pub hour: i64,
    /// Minute text as displayed
    pub minute: String,
    pub meridiem: Meridiem,
}

impl ClockTime {
    /// Decodes an HHMM-like integer. Negative values have no reading.
    pub fn from_hhmm(time: i64) -> Option<Self> {
        if time < 0 {
            return None;
        }

        let text = time.to_string();
        let split = text.len().saturating_sub(2);
        let (hour_text, minute_text) = text.split_at(split);

        let raw_hour: i64 = if hour_text.is_empty() {
            0
        } else {
            hour_text.parse().ok()?
        };

        let (hour, meridiem) = match raw_hour {
            0 => (12, Meridiem::Am),
            12 => (12, Meridiem::Pm),
            h if h > 12 => (h - 12, Meridiem::Pm),
            h => (h, Meridiem::Am),
        };

        let minute = if minute_text == "0" {
            "00".to_string()
        } else {
            minute_text.to_string()
        };

        Some(Self {
            hour,
            minute,
            meridiem,
        })
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.hour, self.minute, self.meridiem.suffix())
    }
}

/// Composes `"{date} {hour}:{minute} {suffix}"`.
pub fn format_label(date: &DateKey, time: i64) -> Option<String> {
    ClockTime::from_hhmm(time).map(|clock| format!("{} {}", date, clock))
}
