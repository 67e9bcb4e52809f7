//! Incident data model - the read-only, time-indexed feature collection.
//!
//! Every component shares the same [`IncidentCollection`] through an `Arc`.
//! Nothing mutates it after load.

use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Incident category, taken from the `type` property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IncidentKind {
    Fire,
    Police,
    Shots,
    /// Any other category (311 calls, damaged buildings, ...), kept verbatim
    Other(String),
}

impl IncidentKind {
    /// Returns the property value used on the wire and in filter expressions.
    pub fn as_str(&self) -> &str {
        match self {
            IncidentKind::Fire => "fire",
            IncidentKind::Police => "police",
            IncidentKind::Shots => "shots",
            IncidentKind::Other(other) => other,
        }
    }
}

impl From<&str> for IncidentKind {
    fn from(value: &str) -> Self {
        match value {
            "fire" => IncidentKind::Fire,
            "police" => IncidentKind::Police,
            "shots" => IncidentKind::Shots,
            other => IncidentKind::Other(other.to_string()),
        }
    }
}

impl From<String> for IncidentKind {
    fn from(value: String) -> Self {
        IncidentKind::from(value.as_str())
    }
}

impl From<IncidentKind> for String {
    fn from(kind: IncidentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw `date` attribute of a feature.
///
/// Sources mix numeric day serials (`43979`) and strings (`"5/28"`), so the
/// value is kept as text. Numbers are stored as their JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateKey(pub String);

impl DateKey {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the date text as displayed in labels.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integral date serial, when the text is one.
    ///
    /// `"43979"`, `" 43979 "` and `"43979.0"` all give `43979`;
    /// `"43979.5"` and `"May 27"` give `None`.
    pub fn as_serial(&self) -> Option<i64> {
        let text = self.0.trim();
        if let Ok(value) = text.parse::<i64>() {
            return Some(value);
        }
        match text.parse::<f64>() {
            Ok(value)
                if value.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&value) =>
            {
                Some(value as i64)
            }
            _ => None,
        }
    }

    /// Exact equality against a numeric date serial. `"4397"` does not
    /// match `43979`.
    pub fn matches_serial(&self, serial: i64) -> bool {
        self.as_serial() == Some(serial)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single incident record.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentFeature {
    /// Ordering key, doubles as the time-bucket id
    pub index: i64,

    /// Date attribute (label text and snapshot bucket)
    pub date: DateKey,

    /// HHMM-like time encoding; `None` when absent or unusable
    pub time: Option<i64>,

    /// Incident category
    pub kind: IncidentKind,

    /// Location, in longitude/latitude degrees
    pub geometry: Geometry<f64>,
}

/// Inclusive range of `index` values present in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub min: i64,
    pub max: i64,
}

impl IndexRange {
    /// Creates a range, swapping the bounds if given in reverse.
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, n: i64) -> bool {
        n >= self.min && n <= self.max
    }

    /// Clamps `n` into the legal range.
    pub fn clamp(&self, n: i64) -> i64 {
        n.clamp(self.min, self.max)
    }

    /// Number of legal cursor positions.
    pub fn span(&self) -> u64 {
        self.max.abs_diff(self.min).saturating_add(1)
    }

    /// The autoplay successor of `cursor`: one step forward, wrapping from
    /// `max` back to `min` (never to zero unless `min` is zero).
    pub fn next_after(&self, cursor: i64) -> i64 {
        if cursor >= self.max || cursor < self.min {
            self.min
        } else {
            cursor + 1
        }
    }
}

/// Ordered, read-only collection of incident features.
///
/// `index` values are not assumed contiguous or sorted.
#[derive(Debug, Clone, Default)]
pub struct IncidentCollection {
    features: Vec<IncidentFeature>,

    /// (index, position) pairs sorted by index, stable on load order
    by_index: Vec<(i64, usize)>,
}

impl IncidentCollection {
    /// Builds a collection, keeping load order.
    pub fn new(features: Vec<IncidentFeature>) -> Self {
        let mut by_index: Vec<(i64, usize)> = features
            .iter()
            .enumerate()
            .map(|(pos, f)| (f.index, pos))
            .collect();
        by_index.sort_by_key(|(index, _)| *index);

        Self { features, by_index }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IncidentFeature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[IncidentFeature] {
        &self.features
    }

    /// Min/max over the `index` attribute, `None` for an empty collection.
    pub fn index_range(&self) -> Option<IndexRange> {
        let first = self.by_index.first()?;
        let last = self.by_index.last()?;
        Some(IndexRange::new(first.0, last.0))
    }

    /// The record whose time is shown when the cursor is at `n`.
    ///
    /// That is the feature with `index == n`, or, across a gap, the one with
    /// the greatest `index` below `n`. Among equal indices the last loaded
    /// record wins.
    pub fn label_record(&self, n: i64) -> Option<&IncidentFeature> {
        let upper = self.by_index.partition_point(|(index, _)| *index <= n);
        let (_, pos) = self.by_index.get(upper.checked_sub(1)?)?;
        self.features.get(*pos)
    }

    /// Features whose `date` equals `serial` exactly.
    pub fn on_date(&self, serial: i64) -> impl Iterator<Item = &IncidentFeature> {
        self.features
            .iter()
            .filter(move |f| f.date.matches_serial(serial))
    }
}

impl FromIterator<IncidentFeature> for IncidentCollection {
    fn from_iter<I: IntoIterator<Item = IncidentFeature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One polygon of the small-multiple boundary set.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    /// `id` property, when present
    pub id: Option<String>,

    /// Outline in longitude/latitude degrees
    pub geometry: MultiPolygon<f64>,
}

/// Read-only polygon set shared by every snapshot panel.
#[derive(Debug, Clone, Default)]
pub struct BoundaryCollection {
    features: Vec<BoundaryFeature>,
}

impl BoundaryCollection {
    pub fn new(features: Vec<BoundaryFeature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundaryFeature> {
        self.features.iter()
    }
}

impl FromIterator<BoundaryFeature> for BoundaryCollection {
    fn from_iter<I: IntoIterator<Item = BoundaryFeature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
