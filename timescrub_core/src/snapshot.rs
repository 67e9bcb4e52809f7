//! Snapshot Renderer - small-multiple panels fixed to one date each.
//!
//! A [`SnapshotPanel`] binds to one drawing surface, projects the shared
//! boundary set and draws a marker for every incident whose `date` equals
//! the panel's assigned value. Panels share the source collections
//! read-only and never share drawing state.
//!
//! Sizing is static: the scale factor is computed once from the surface
//! width at construction. [`SnapshotPanel::handle_resize`] only tracks the
//! viewport width; drawn geometry is not rescaled.

use crate::config::{PanelConfig, TimescrubConfig};
use crate::error::SnapshotError;
use crate::incidents::{BoundaryCollection, IncidentCollection};
use crate::projection::{projected_centroid, Mercator, Projection};
use crate::surface::{CircleStyle, DrawingSurface, PathStyle, SurfaceLocator};
use geo::MapCoords;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a render produced nothing worth showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The boundary set had no polygons
    NoBoundaries,
    /// No incident has the panel's assigned date
    NoIncidentsForDate,
}

/// Element counts of one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub boundaries: usize,
    pub markers: usize,
    /// Matching incidents whose geometry had no centroid
    pub skipped: usize,
}

/// Result of [`SnapshotPanel::render`]. Never an error: an empty panel is
/// a valid, logged outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn(RenderReport),
    Empty {
        reason: EmptyReason,
        report: RenderReport,
    },
}

impl RenderOutcome {
    pub fn report(&self) -> RenderReport {
        match self {
            RenderOutcome::Drawn(report) => *report,
            RenderOutcome::Empty { report, .. } => *report,
        }
    }

    pub fn markers(&self) -> usize {
        self.report().markers
    }

    pub fn boundaries(&self) -> usize {
        self.report().boundaries
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RenderOutcome::Empty { .. })
    }
}

/// One small-multiple panel.
#[derive(Debug)]
pub struct SnapshotPanel<S: DrawingSurface> {
    selector: String,
    assigned_date: i64,
    surface: S,
    projection: Mercator,
    panel: PanelConfig,
    scale_factor: f64,
    viewport_width: f64,
}

impl<S: DrawingSurface> SnapshotPanel<S> {
    /// Binds a panel to the surface behind `selector`.
    ///
    /// # Errors
    /// [`SnapshotError::SurfaceNotFound`] when the locator has no such
    /// surface, [`SnapshotError::SurfaceInUse`] when another panel holds it.
    pub fn create<L>(
        selector: &str,
        assigned_date: i64,
        locator: &mut L,
        config: &TimescrubConfig,
    ) -> Result<Self, SnapshotError>
    where
        L: SurfaceLocator<Surface = S>,
    {
        let surface = locator.locate(selector)?;
        let width = surface.width();
        let scale_factor = width / config.panel.reference_width;
        debug!(selector, assigned_date, width, scale_factor, "panel created");

        Ok(Self {
            selector: selector.to_string(),
            assigned_date,
            surface,
            projection: Mercator::from_config(&config.projection),
            panel: config.panel.clone(),
            scale_factor,
            viewport_width: config.panel.viewport_width,
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn assigned_date(&self) -> i64 {
        self.assigned_date
    }

    /// Surface width over the reference width, fixed at construction.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Clears the surface, then draws boundaries and the assigned date's
    /// markers. Calling it again yields the same drawing.
    pub fn render(
        &mut self,
        boundaries: &BoundaryCollection,
        incidents: &IncidentCollection,
    ) -> RenderOutcome {
        self.surface.clear();

        let path_style = PathStyle {
            fill: self.panel.boundary_fill.clone(),
            stroke: self.panel.boundary_stroke.clone(),
            stroke_width: self.panel.boundary_stroke_width,
        };
        let circle_style = CircleStyle {
            fill: self.panel.marker_fill.clone(),
        };

        let mut report = RenderReport::default();

        for boundary in boundaries.iter() {
            let projected = boundary
                .geometry
                .map_coords(|c| self.projection.project(c));
            self.surface
                .draw_path(&projected, boundary.id.as_deref(), &path_style);
            report.boundaries += 1;
        }

        for incident in incidents.on_date(self.assigned_date) {
            match projected_centroid(&self.projection, &incident.geometry) {
                Some(center) => {
                    self.surface
                        .draw_circle(center, self.panel.marker_radius, &circle_style);
                    report.markers += 1;
                }
                None => report.skipped += 1,
            }
        }

        let outcome = if report.boundaries == 0 {
            RenderOutcome::Empty {
                reason: EmptyReason::NoBoundaries,
                report,
            }
        } else if report.markers == 0 {
            RenderOutcome::Empty {
                reason: EmptyReason::NoIncidentsForDate,
                report,
            }
        } else {
            RenderOutcome::Drawn(report)
        };

        match outcome {
            RenderOutcome::Empty { reason, .. } => warn!(
                selector = %self.selector,
                date = self.assigned_date,
                ?reason,
                skipped = report.skipped,
                "panel rendered empty"
            ),
            RenderOutcome::Drawn(_) => debug!(
                selector = %self.selector,
                date = self.assigned_date,
                boundaries = report.boundaries,
                markers = report.markers,
                "panel rendered"
            ),
        }

        outcome
    }

    /// Records a viewport width change. Returns `true` when the width
    /// differs from the cached one. Geometry is not redrawn.
    pub fn handle_resize(&mut self, viewport_width: f64) -> bool {
        if viewport_width == self.viewport_width {
            return false;
        }
        debug!(
            selector = %self.selector,
            from = self.viewport_width,
            to = viewport_width,
            "viewport width changed"
        );
        self.viewport_width = viewport_width;
        true
    }

    /// Last known viewport width, independent of the surface width.
    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    /// Whether the viewport, not the panel, is under the mobile breakpoint.
    pub fn is_mobile(&self) -> bool {
        self.viewport_width < self.panel.mobile_breakpoint
    }
}

/// Per-panel result of [`SmallMultiples::render_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct PanelResult {
    pub selector: String,
    pub assigned_date: i64,
    pub outcome: RenderOutcome,
}

/// Factory and ordered container for the small-multiple grid.
///
/// Source collections are shared by `Arc`; each panel owns its surface.
pub struct SmallMultiples<L: SurfaceLocator> {
    locator: L,
    config: TimescrubConfig,
    boundaries: Arc<BoundaryCollection>,
    incidents: Arc<IncidentCollection>,
    panels: Vec<SnapshotPanel<L::Surface>>,
}

impl<L: SurfaceLocator> SmallMultiples<L> {
    pub fn new(
        locator: L,
        config: TimescrubConfig,
        boundaries: Arc<BoundaryCollection>,
        incidents: Arc<IncidentCollection>,
    ) -> Self {
        Self {
            locator,
            config,
            boundaries,
            incidents,
            panels: Vec::new(),
        }
    }

    /// Creates and stores a panel. A failure leaves existing panels intact.
    pub fn add_panel(&mut self, selector: &str, assigned_date: i64) -> Result<(), SnapshotError> {
        let panel = SnapshotPanel::create(selector, assigned_date, &mut self.locator, &self.config)?;
        self.panels.push(panel);
        Ok(())
    }

    /// Adds every `(selector, date)` pair, reporting each outcome.
    pub fn add_panels<'a, I>(&mut self, assignments: I) -> Vec<Result<(), SnapshotError>>
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        assignments
            .into_iter()
            .map(|(selector, date)| {
                let result = self.add_panel(selector, date);
                if let Err(e) = &result {
                    warn!(selector, date, error = %e, "panel not created");
                }
                result
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn panels(&self) -> &[SnapshotPanel<L::Surface>] {
        &self.panels
    }

    pub fn into_panels(self) -> Vec<SnapshotPanel<L::Surface>> {
        self.panels
    }

    /// Renders every panel in insertion order.
    pub fn render_all(&mut self) -> Vec<PanelResult> {
        let boundaries = Arc::clone(&self.boundaries);
        let incidents = Arc::clone(&self.incidents);

        let results: Vec<PanelResult> = self
            .panels
            .iter_mut()
            .map(|panel| PanelResult {
                selector: panel.selector().to_string(),
                assigned_date: panel.assigned_date(),
                outcome: panel.render(&boundaries, &incidents),
            })
            .collect();

        let empty = results.iter().filter(|r| r.outcome.is_empty()).count();
        info!(panels = results.len(), empty, "small multiples rendered");
        results
    }

    /// Forwards a viewport width change to every panel.
    pub fn handle_resize(&mut self, viewport_width: f64) -> usize {
        self.panels
            .iter_mut()
            .map(|panel| panel.handle_resize(viewport_width))
            .filter(|changed| *changed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::{BoundaryFeature, DateKey, IncidentFeature, IncidentKind};
    use crate::surface::{SurfaceRegistry, SvgSurface};
    use geo::{polygon, Geometry, MultiPolygon, Point};

    fn incident(index: i64, date: &str) -> IncidentFeature {
        IncidentFeature {
            index,
            date: DateKey::new(date),
            time: Some(1200),
            kind: IncidentKind::Fire,
            geometry: Geometry::Point(Point::new(-93.07 + index as f64 * 0.001, 44.93)),
        }
    }

    fn incidents() -> Arc<IncidentCollection> {
        Arc::new(IncidentCollection::new(vec![
            incident(0, "43979"),
            incident(1, "43979"),
            incident(2, "43980"),
            incident(3, "43979.5"),
            incident(4, "439790"),
            incident(5, "43980"),
            incident(6, "43980"),
        ]))
    }

    fn boundaries() -> Arc<BoundaryCollection> {
        let square = |x0: f64| {
            MultiPolygon::new(vec![polygon![
                (x: x0, y: 44.92),
                (x: x0 + 0.01, y: 44.92),
                (x: x0 + 0.01, y: 44.94),
                (x: x0, y: 44.94),
            ]])
        };
        Arc::new(BoundaryCollection::new(vec![
            BoundaryFeature {
                id: Some("1".to_string()),
                geometry: square(-93.08),
            },
            BoundaryFeature {
                id: Some("2".to_string()),
                geometry: square(-93.07),
            },
        ]))
    }

    fn registry(selectors: &[&str]) -> SurfaceRegistry<SvgSurface> {
        SurfaceRegistry::with_svg(selectors, 200.0, 300.0)
    }

    #[test]
    fn test_create_missing_surface() {
        let mut registry = registry(&["#a"]);
        let result = SnapshotPanel::create("#b", 43979, &mut registry, &TimescrubConfig::default());
        assert!(matches!(result, Err(SnapshotError::SurfaceNotFound(s)) if s == "#b"));
    }

    #[test]
    fn test_scale_factor_from_surface_width() {
        let mut registry = SurfaceRegistry::with_svg(&["#a"], 260.0, 300.0);
        let panel = SnapshotPanel::create("#a", 43979, &mut registry, &TimescrubConfig::default()).unwrap();
        assert_eq!(panel.scale_factor(), 0.5);
    }

    #[test]
    fn test_marker_count_is_exact_date_match() {
        let mut registry = registry(&["#a", "#b"]);
        let config = TimescrubConfig::default();
        let (b, i) = (boundaries(), incidents());

        let mut a = SnapshotPanel::create("#a", 43979, &mut registry, &config).unwrap();
        let outcome = a.render(&b, &i);
        assert_eq!(outcome, RenderOutcome::Drawn(RenderReport { boundaries: 2, markers: 2, skipped: 0 }));
        assert_eq!(a.surface().circle_count(), i.on_date(43979).count());

        let mut b_panel = SnapshotPanel::create("#b", 43980, &mut registry, &config).unwrap();
        assert_eq!(b_panel.render(&b, &i).markers(), 3);
    }

    #[test]
    fn test_zero_match_date_draws_no_markers() {
        let mut registry = registry(&["#a"]);
        let mut panel = SnapshotPanel::create("#a", 1, &mut registry, &TimescrubConfig::default()).unwrap();

        let outcome = panel.render(&boundaries(), &incidents());
        assert_eq!(
            outcome,
            RenderOutcome::Empty {
                reason: EmptyReason::NoIncidentsForDate,
                report: RenderReport { boundaries: 2, markers: 0, skipped: 0 },
            }
        );
        assert_eq!(panel.surface().circle_count(), 0);
        assert_eq!(panel.surface().path_count(), 2);
    }

    #[test]
    fn test_missing_boundaries_is_empty_outcome() {
        let mut registry = registry(&["#a"]);
        let mut panel = SnapshotPanel::create("#a", 43979, &mut registry, &TimescrubConfig::default()).unwrap();

        let outcome = panel.render(&BoundaryCollection::default(), &incidents());
        assert!(matches!(
            outcome,
            RenderOutcome::Empty { reason: EmptyReason::NoBoundaries, .. }
        ));
        assert_eq!(outcome.markers(), 2);
    }

    #[test]
    fn test_render_twice_is_idempotent() {
        let mut registry = registry(&["#a"]);
        let mut panel = SnapshotPanel::create("#a", 43980, &mut registry, &TimescrubConfig::default()).unwrap();
        let (b, i) = (boundaries(), incidents());

        let first = panel.render(&b, &i);
        let first_svg = panel.surface().to_svg();
        let second = panel.render(&b, &i);

        assert_eq!(first, second);
        assert_eq!(panel.surface().to_svg(), first_svg);
        assert_eq!(panel.surface().circle_count(), 3);
        assert_eq!(panel.surface().path_count(), 2);
    }

    #[test]
    fn test_markers_at_projected_centroid() {
        let mut registry = registry(&["#a"]);
        let config = TimescrubConfig::default();
        let mut panel = SnapshotPanel::create("#a", 43979, &mut registry, &config).unwrap();
        let single = IncidentCollection::new(vec![IncidentFeature {
            geometry: Geometry::Point(Point::new(-93.070335, 44.930977)),
            ..incident(0, "43979")
        }]);

        panel.render(&boundaries(), &single);
        let centers = panel.surface().circle_centers();
        assert_eq!(centers.len(), 1);
        assert!((centers[0].x - config.projection.translate[0]).abs() < 1e-9);
        assert!((centers[0].y - config.projection.translate[1]).abs() < 1e-9);
    }

    #[test]
    fn test_empty_geometry_is_skipped() {
        let mut registry = registry(&["#a"]);
        let mut panel = SnapshotPanel::create("#a", 43979, &mut registry, &TimescrubConfig::default()).unwrap();
        let collection = IncidentCollection::new(vec![
            incident(0, "43979"),
            IncidentFeature {
                geometry: Geometry::MultiPoint(geo::MultiPoint::new(vec![])),
                ..incident(1, "43979")
            },
        ]);

        let report = panel.render(&boundaries(), &collection).report();
        assert_eq!(report.markers, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_resize_tracks_width_only() {
        let mut registry = registry(&["#a"]);
        let mut panel = SnapshotPanel::create("#a", 43979, &mut registry, &TimescrubConfig::default()).unwrap();
        panel.render(&boundaries(), &incidents());
        let before = panel.surface().to_svg();

        // A 200px panel on a desktop viewport is not mobile
        assert_eq!(panel.surface().width(), 200.0);
        assert!(!panel.is_mobile());
        assert!(!panel.handle_resize(1280.0));
        assert!(panel.handle_resize(400.0));
        assert!(panel.is_mobile());
        assert_eq!(panel.viewport_width(), 400.0);
        assert!(panel.handle_resize(1024.0));
        assert!(!panel.is_mobile());

        assert_eq!(panel.scale_factor(), 200.0 / 520.0);
        assert_eq!(panel.surface().to_svg(), before);
    }

    #[test]
    fn test_initial_viewport_from_config() {
        let mut config = TimescrubConfig::default();
        config.panel.viewport_width = 375.0;
        let mut registry = registry(&["#a"]);
        let panel = SnapshotPanel::create("#a", 43979, &mut registry, &config).unwrap();

        assert_eq!(panel.viewport_width(), 375.0);
        assert!(panel.is_mobile());
        assert_eq!(panel.scale_factor(), 200.0 / 520.0);
    }

    #[test]
    fn test_panels_are_isolated() {
        let config = TimescrubConfig::default();
        let mut grid = SmallMultiples::new(registry(&["#a", "#b"]), config, boundaries(), incidents());
        grid.add_panel("#a", 43979).unwrap();
        grid.add_panel("#b", 43980).unwrap();

        grid.render_all();
        let a_alone = grid.panels()[0].surface().to_svg();

        grid.render_all();
        let panels = grid.into_panels();
        assert_eq!(panels[0].surface().to_svg(), a_alone);
        assert_eq!(panels[0].surface().circle_count(), 2);
        assert_eq!(panels[1].surface().circle_count(), 3);
        assert_ne!(panels[0].surface().to_svg(), panels[1].surface().to_svg());
    }

    #[test]
    fn test_failed_panel_does_not_affect_siblings() {
        let mut grid = SmallMultiples::new(
            registry(&["#a", "#c"]),
            TimescrubConfig::default(),
            boundaries(),
            incidents(),
        );

        let created = grid.add_panels([("#a", 43979), ("#b", 43980), ("#a", 43980), ("#c", 43980)]);
        assert!(created[0].is_ok());
        assert!(matches!(created[1], Err(SnapshotError::SurfaceNotFound(_))));
        assert!(matches!(created[2], Err(SnapshotError::SurfaceInUse(_))));
        assert!(created[3].is_ok());
        assert_eq!(grid.len(), 2);

        let results = grid.render_all();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].selector, "#a");
        assert_eq!(results[0].outcome.markers(), 2);
        assert_eq!(results[1].selector, "#c");
        assert_eq!(results[1].outcome.markers(), 3);
    }

    #[test]
    fn test_grid_resize() {
        let mut grid = SmallMultiples::new(
            registry(&["#a", "#b"]),
            TimescrubConfig::default(),
            boundaries(),
            incidents(),
        );
        grid.add_panels([("#a", 43979), ("#b", 43980)]);
        assert_eq!(grid.handle_resize(800.0), 2);
        assert_eq!(grid.handle_resize(800.0), 0);
    }
}
