//! JSON exporter for playback runs.
//!
//! Exports one frame per tick so a run can be replayed or diffed offline.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use timescrub_core::{CategoryCounts, RenderOutcome};

/// A single tick of playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackFrame {
    /// Tick number, 0 for the initial state
    pub tick: u64,

    /// Virtual time in milliseconds
    pub time_ms: u64,

    /// Cursor after this tick
    pub cursor: i64,

    /// Clock label shown at this cursor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Features visible per category
    pub visible: CategoryCounts,

    /// True when this tick wrapped from the last index back to the first
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrapped: bool,
}

/// Small-multiple panel summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSummary {
    pub selector: String,
    pub date: i64,
    pub boundaries: usize,
    pub markers: usize,
    pub empty: bool,
}

impl PanelSummary {
    pub fn new(selector: &str, date: i64, outcome: &RenderOutcome) -> Self {
        Self {
            selector: selector.to_string(),
            date,
            boundaries: outcome.boundaries(),
            markers: outcome.markers(),
            empty: outcome.is_empty(),
        }
    }
}

/// Complete playback export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackExport {
    /// Where the incidents came from (file path or "synthetic")
    pub source: String,

    /// Seed used
    pub seed: u64,

    /// Tick period in milliseconds
    pub period_ms: u64,

    /// Legal cursor range
    pub min_index: i64,
    pub max_index: i64,

    /// All frames
    pub frames: Vec<PlaybackFrame>,

    /// Rendered panels, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<PanelSummary>,
}

impl PlaybackExport {
    /// Creates a new export container.
    pub fn new(source: &str, seed: u64, period_ms: u64, min_index: i64, max_index: i64) -> Self {
        Self {
            source: source.to_string(),
            seed,
            period_ms,
            min_index,
            max_index,
            frames: Vec::new(),
            panels: Vec::new(),
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: PlaybackFrame) {
        self.frames.push(frame);
    }

    pub fn add_panel(&mut self, panel: PanelSummary) {
        self.panels.push(panel);
    }

    /// Number of ticks that wrapped around.
    pub fn wraps(&self) -> usize {
        self.frames.iter().filter(|f| f.wrapped).count()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let io_err = |source| SimError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut file = File::create(path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tick: u64, cursor: i64, wrapped: bool) -> PlaybackFrame {
        PlaybackFrame {
            tick,
            time_ms: tick * 50,
            cursor,
            label: Some("43979 9:30 p.m.".to_string()),
            visible: CategoryCounts::default(),
            wrapped,
        }
    }

    #[test]
    fn test_export_json_shape() {
        let mut export = PlaybackExport::new("synthetic", 42, 50, 0, 9);
        export.add_frame(frame(0, 0, false));
        export.add_frame(frame(1, 1, false));
        export.add_frame(frame(2, 0, true));

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["frames"].as_array().unwrap().len(), 3);
        assert_eq!(json["frames"][2]["wrapped"], true);
        assert!(json["frames"][0].get("wrapped").is_none());
        assert!(json.get("panels").is_none());
        assert_eq!(export.wraps(), 1);
    }

    #[test]
    fn test_write_and_read_back() {
        let mut export = PlaybackExport::new("synthetic", 7, 50, 0, 3);
        export.add_frame(frame(0, 0, false));

        let path = std::env::temp_dir().join(format!("timescrub-export-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: PlaybackExport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, export);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_to_bad_path() {
        let export = PlaybackExport::new("synthetic", 7, 50, 0, 3);
        let err = export.write_to_file(Path::new("/nonexistent/dir/out.json")).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }
}
