//! Typed configuration for the timeline and the snapshot panels.
//!
//! Every field has a default matching the published map, so an empty JSON
//! object (`{}`) is a complete configuration.

use crate::error::ConfigError;
use crate::predicate::TimelineCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimescrubConfig {
    /// Autoplay timing
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Main-map layer ids per category
    #[serde(default)]
    pub layers: LayerBindings,

    /// Fixed small-multiple projection
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Small-multiple panel geometry and paint
    #[serde(default)]
    pub panel: PanelConfig,
}

impl TimescrubConfig {
    /// Loads and validates configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would stall playback or break panel scaling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "playback.period_ms must be at least 1".to_string(),
            ));
        }
        if !(self.panel.reference_width > 0.0) {
            return Err(ConfigError::Invalid(
                "panel.reference_width must be positive".to_string(),
            ));
        }
        if !(self.projection.scale > 0.0) {
            return Err(ConfigError::Invalid(
                "projection.scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Autoplay timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Tick period in milliseconds (default: 50)
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

fn default_period_ms() -> u64 {
    50
}

impl PlaybackConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

/// Which main-map layer displays each category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerBindings {
    pub fire: String,
    pub police: String,
    pub shots: String,
}

impl LayerBindings {
    pub fn layer_for(&self, category: TimelineCategory) -> &str {
        match category {
            TimelineCategory::Fire => &self.fire,
            TimelineCategory::Police => &self.police,
            TimelineCategory::Shots => &self.shots,
        }
    }
}

impl Default for LayerBindings {
    fn default() -> Self {
        Self {
            fire: "fire-layer".to_string(),
            police: "police-layer".to_string(),
            shots: "shots-layer".to_string(),
        }
    }
}

/// Mercator parameters shared by every panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Projection scale (pixels per radian)
    pub scale: f64,
    /// `[longitude, latitude]` drawn at `translate`
    pub center: [f64; 2],
    /// Pixel position of the center
    pub translate: [f64; 2],
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            scale: 80000.0,
            center: [-93.070335, 44.930977],
            translate: [480.0, 250.0],
        }
    }
}

/// Small-multiple geometry and paint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Width the panel layout was designed at
    pub reference_width: f64,
    /// Drawing surface width
    pub width: f64,
    /// Drawing surface height
    pub height: f64,
    /// Viewport width assumed until the first resize
    pub viewport_width: f64,
    /// Viewports narrower than this are treated as mobile
    pub mobile_breakpoint: f64,
    pub boundary_fill: String,
    pub boundary_stroke: String,
    pub boundary_stroke_width: f64,
    pub marker_fill: String,
    pub marker_radius: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            reference_width: 520.0,
            width: 200.0,
            height: 300.0,
            viewport_width: 1280.0,
            mobile_breakpoint: 520.0,
            boundary_fill: "#dddddd".to_string(),
            boundary_stroke: "#ffffff".to_string(),
            boundary_stroke_width: 1.0,
            marker_fill: "#9E403C".to_string(),
            marker_radius: 1.0,
        }
    }
}
