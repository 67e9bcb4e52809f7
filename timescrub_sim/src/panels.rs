//! Writes the small-multiple grid to SVG files.

use crate::error::SimError;
use crate::exporter::PanelSummary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use timescrub_core::{
    BoundaryCollection, IncidentCollection, SmallMultiples, SnapshotError, SurfaceRegistry, SvgSurface,
    TimescrubConfig,
};
use tracing::{info, warn};

/// Every distinct numeric date serial in the collection, ascending.
pub fn distinct_dates(incidents: &IncidentCollection) -> Vec<i64> {
    let mut dates: Vec<i64> = incidents.iter().filter_map(|f| f.date.as_serial()).collect();
    dates.sort_unstable();
    dates.dedup();
    dates
}

/// Selector used for the panel of `date`.
pub fn selector_for(date: i64) -> String {
    format!("#panel-{}", date)
}

fn file_for(dir: &Path, date: i64) -> PathBuf {
    dir.join(format!("panel-{}.svg", date))
}

type SvgGrid = SmallMultiples<SurfaceRegistry<SvgSurface>>;

fn build_grid(
    dates: &[i64],
    config: &TimescrubConfig,
    boundaries: Arc<BoundaryCollection>,
    incidents: Arc<IncidentCollection>,
) -> SvgGrid {
    let selectors: Vec<String> = dates.iter().map(|d| selector_for(*d)).collect();
    let selector_refs: Vec<&str> = selectors.iter().map(String::as_str).collect();
    let registry = SurfaceRegistry::with_svg(&selector_refs, config.panel.width, config.panel.height);

    let mut grid = SmallMultiples::new(registry, config.clone(), boundaries, incidents);
    grid.add_panels(selector_refs.iter().copied().zip(dates.iter().copied()));
    grid
}

/// Renders one panel per date into `dir/panel-{date}.svg`.
///
/// A panel that fails to write is logged and left out of the summary;
/// the remaining panels are still written.
pub fn render_to_dir(
    dir: &Path,
    dates: &[i64],
    config: &TimescrubConfig,
    boundaries: Arc<BoundaryCollection>,
    incidents: Arc<IncidentCollection>,
) -> Result<Vec<PanelSummary>, SimError> {
    std::fs::create_dir_all(dir).map_err(|source| SimError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut grid = build_grid(dates, config, boundaries, incidents);
    let results = grid.render_all();
    let mut summaries = Vec::with_capacity(results.len());

    for (result, panel) in results.iter().zip(grid.panels()) {
        let path = file_for(dir, result.assigned_date);
        let written = panel
            .surface()
            .write_to_file(&path)
            .map_err(|source| SnapshotError::Output {
                selector: result.selector.clone(),
                source,
            });
        match written {
            Ok(()) => summaries.push(PanelSummary::new(
                &result.selector,
                result.assigned_date,
                &result.outcome,
            )),
            Err(e) => warn!(error = %e, "panel not written"),
        }
    }

    info!(dir = %dir.display(), panels = summaries.len(), "panels written");
    Ok(summaries)
}

/// Renders panels in memory only, for callers that want the SVG text.
pub fn render_in_memory(
    dates: &[i64],
    config: &TimescrubConfig,
    boundaries: Arc<BoundaryCollection>,
    incidents: Arc<IncidentCollection>,
) -> Vec<(i64, SvgSurface)> {
    let mut grid = build_grid(dates, config, boundaries, incidents);
    grid.render_all();

    grid.into_panels()
        .into_iter()
        .map(|panel| (panel.assigned_date(), panel.into_surface()))
        .collect()
}
