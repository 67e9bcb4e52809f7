//! timescrub core - temporal filtering for time-scrubbable incident maps
//!
//! Two cooperating engines share one read-only incident collection:
//! 1. **Timeline Controller**: maps a scalar time cursor to per-category
//!    layer filters and a clock label, with click-to-play autoplay
//! 2. **Snapshot Renderer**: small-multiple panels, each drawing the
//!    incidents of one fixed date over a shared boundary layer

pub mod config;
pub mod controller;
pub mod error;
pub mod geojson;
pub mod incidents;
pub mod label;
pub mod predicate;
pub mod projection;
pub mod snapshot;
pub mod sources;
pub mod surface;
pub mod timeline;
pub mod topojson;

// Re-export key types for convenience
pub use config::{LayerBindings, PanelConfig, PlaybackConfig, ProjectionConfig, TimescrubConfig};
pub use controller::{LabelSink, LayerSurface, PlaybackState, ScrubControl, SubscriptionId, TimelineController};
pub use error::{ConfigError, DataError, SnapshotError, TimelineError};
pub use incidents::{
    BoundaryCollection, BoundaryFeature, DateKey, IncidentCollection, IncidentFeature, IncidentKind, IndexRange,
};
pub use predicate::{CategoryCounts, CategoryPredicate, FilterExpression, PredicateSet, TimelineCategory};
pub use projection::{Mercator, Projection};
pub use snapshot::{EmptyReason, PanelResult, RenderOutcome, RenderReport, SmallMultiples, SnapshotPanel};
pub use surface::{CircleStyle, DrawingSurface, PathStyle, SurfaceLocator, SurfaceRegistry, SvgSurface};
pub use timeline::{CursorOutcome, CursorSource, TimelineState, TimelineUpdate};
