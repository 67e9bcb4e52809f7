//! Error types for the timescrub core engines.

use thiserror::Error;
use timescrub_env::EnvError;

/// Errors raised while decoding feature collections.
///
/// Individual malformed records never produce these; they are skipped and
/// counted. Only a document that cannot be a collection at all is rejected.
#[derive(Debug, Error)]
pub enum DataError {
    /// Input was not valid JSON or did not match the collection shape
    #[error("Failed to parse {format}: {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Top-level `type` was not the expected collection type
    #[error("Expected a {expected} document, found '{found}'")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },

    /// Named TopoJSON object does not exist in the topology
    #[error("TopoJSON object '{0}' not found")]
    MissingObject(String),

    /// File could not be read
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DataError {
    /// Wraps a serde_json error for the given format name.
    pub fn parse(format: &'static str, source: serde_json::Error) -> Self {
        Self::Parse { format, source }
    }
}

/// Errors raised by the timeline controller.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The collection has no features, so there is no legal cursor range
    #[error("Incident collection is empty; no index range to scrub")]
    EmptyCollection,

    /// Playback tick period was zero
    #[error("Playback period must be at least 1ms")]
    InvalidPeriod,

    /// Playback ticker could not be scheduled
    #[error("Failed to schedule playback: {0}")]
    Schedule(#[from] EnvError),
}

/// Errors raised by snapshot panels.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No drawing surface is registered under the selector
    #[error("No drawing surface found for selector '{0}'")]
    SurfaceNotFound(String),

    /// Two panels claimed the same drawing surface
    #[error("Drawing surface '{0}' is already bound to a panel")]
    SurfaceInUse(String),

    /// Surface rejected an output operation
    #[error("Failed to write panel '{selector}': {source}")]
    Output {
        selector: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration was not valid JSON
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration parsed but holds an unusable value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
