//! Error types for the simulation harness.

use thiserror::Error;
use timescrub_core::{ConfigError, DataError, SnapshotError, TimelineError};

/// Errors surfaced by the runner and the CLI.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Export could not be serialized
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Output file could not be written
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Ticker did not fire after virtual time passed its deadline
    #[error("Playback ticker stalled at tick {0}")]
    Stalled(u64),
}
