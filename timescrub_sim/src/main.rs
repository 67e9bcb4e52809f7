//! timescrub playback simulator CLI
//!
//! Replays timeline autoplay on a virtual clock and renders small multiples.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use timescrub_core::{sources, BoundaryCollection, IncidentCollection, TimescrubConfig};
use timescrub_sim::{panels, synthetic, PlaybackExport, PlaybackRunner, SimContext, SimError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "timescrub-sim")]
#[command(about = "Replay time-scrubbable incident map playback deterministically", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Incident collection (GeoJSON or TopoJSON); synthetic data if omitted
    #[arg(short, long)]
    incidents: Option<PathBuf>,

    /// Small-multiple boundary set (GeoJSON or TopoJSON); synthetic grid if omitted
    #[arg(short, long)]
    boundaries: Option<PathBuf>,

    /// TopoJSON object holding the incidents (defaults to the first object in the file)
    #[arg(long)]
    incidents_object: Option<String>,

    /// TopoJSON object holding the boundaries (defaults to the first object in the file)
    #[arg(long)]
    boundaries_object: Option<String>,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of playback ticks to run
    #[arg(short, long, default_value = "100")]
    ticks: u64,

    /// Cursor to start playback from (defaults to the first index)
    #[arg(long)]
    start: Option<i64>,

    /// Drive playback through the controller's own ticker task
    #[arg(long)]
    live: bool,

    /// Export playback frames to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write one SVG small-multiple panel per date into this directory
    #[arg(long)]
    panels: Option<PathBuf>,

    /// Panel dates (day serials); every date in the data if omitted
    #[arg(long, value_delimiter = ',')]
    dates: Vec<i64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn load_config(path: Option<&Path>) -> Result<TimescrubConfig, SimError> {
    match path {
        Some(path) => Ok(TimescrubConfig::from_file(path)?),
        None => Ok(TimescrubConfig::default()),
    }
}

fn load_sources(
    args: &Args,
    ctx: &SimContext,
) -> Result<(String, IncidentCollection, BoundaryCollection), SimError> {
    let shape = synthetic::SyntheticConfig::default();

    let (source, incidents) = match &args.incidents {
        Some(path) => (
            path.display().to_string(),
            sources::load_incidents(path, args.incidents_object.as_deref())?,
        ),
        None => (
            "synthetic".to_string(),
            synthetic::generate_incidents(&mut ctx.derive_rng(0), &shape),
        ),
    };
    let boundaries = match &args.boundaries {
        Some(path) => sources::load_boundaries(path, args.boundaries_object.as_deref())?,
        None => synthetic::generate_boundaries(&shape),
    };
    Ok((source, incidents, boundaries))
}

async fn run(args: &Args, seed: u64) -> Result<PlaybackExport, SimError> {
    let config = load_config(args.config.as_deref())?;
    let ctx = SimContext::shared(seed);
    let (source, incidents, boundaries) = load_sources(args, &ctx)?;
    let incidents = Arc::new(incidents);
    let boundaries = Arc::new(boundaries);

    let mut runner = PlaybackRunner::new(Arc::clone(&ctx), Arc::clone(&incidents), &config)?;
    if let Some(start) = args.start {
        runner.start_at(start);
    }

    let frames = if args.live {
        runner.run_live(args.ticks).await?
    } else {
        runner.run(args.ticks)
    };
    let mut export = runner.export(&source, frames);

    if let Some(dir) = &args.panels {
        let dates = if args.dates.is_empty() {
            panels::distinct_dates(&incidents)
        } else {
            args.dates.clone()
        };
        for summary in panels::render_to_dir(dir, &dates, &config, boundaries, incidents)? {
            export.add_panel(summary);
        }
    }

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported {} frames to {}", export.frames.len(), path.display());
    }

    Ok(export)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("timescrub playback simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Determine base seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let export = match run(&args, seed).await {
        Ok(export) => export,
        Err(e) => {
            error!("✗ playback failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let last = export.frames.last();
    if args.json {
        let summary = serde_json::json!({
            "source": export.source,
            "seed": export.seed,
            "ticks": export.frames.len().saturating_sub(1),
            "min_index": export.min_index,
            "max_index": export.max_index,
            "wraps": export.wraps(),
            "final_cursor": last.map(|f| f.cursor),
            "final_label": last.and_then(|f| f.label.clone()),
            "panels": export.panels,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize summary: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "✓ {} ticks over [{}, {}] from {} (seed={}), {} wrap(s)",
            export.frames.len().saturating_sub(1),
            export.min_index,
            export.max_index,
            export.source,
            export.seed,
            export.wraps()
        );
        if let Some(frame) = last {
            info!(
                "  final cursor {} | {} | fire={} police={} shots={}",
                frame.cursor,
                frame.label.as_deref().unwrap_or("-"),
                frame.visible.fire,
                frame.visible.police,
                frame.visible.shots
            );
        }
        for panel in &export.panels {
            info!(
                "  panel {} date={} markers={}{}",
                panel.selector,
                panel.date,
                panel.markers,
                if panel.empty { " (empty)" } else { "" }
            );
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use timescrub_core::DataError;

    const INCIDENTS: &str = r#"{
        "type": "Topology",
        "transform": { "scale": [0.001, 0.001], "translate": [-93.3, 44.9] },
        "arcs": [],
        "objects": {
            "incidents_all": {
                "type": "GeometryCollection",
                "geometries": [
                    { "type": "Point", "coordinates": [100, 50],
                      "properties": { "index": 0, "date": 43979, "time": 2300, "type": "fire" } }
                ]
            }
        }
    }"#;

    const BOUNDARIES: &str = r#"{
        "type": "Topology",
        "arcs": [[[-93.3, 44.9], [-93.2, 44.9], [-93.2, 45.0], [-93.3, 45.0], [-93.3, 44.9]]],
        "objects": {
            "mpct": {
                "type": "GeometryCollection",
                "geometries": [{ "type": "Polygon", "arcs": [[0]], "properties": { "id": 1 } }]
            }
        }
    }"#;

    fn write_sources(name: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("timescrub-cli-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let incidents = dir.join("incidents.topojson");
        let boundaries = dir.join("mpls.topojson");
        std::fs::write(&incidents, INCIDENTS).unwrap();
        std::fs::write(&boundaries, BOUNDARIES).unwrap();
        (incidents, boundaries)
    }

    fn cli(incidents: &Path, boundaries: &Path, extra: &[&str]) -> Args {
        let mut argv = vec![
            "timescrub-sim".to_string(),
            "--incidents".to_string(),
            incidents.display().to_string(),
            "--boundaries".to_string(),
            boundaries.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_objects_named_per_source() {
        let (incidents, boundaries) = write_sources("named");
        let args = cli(
            &incidents,
            &boundaries,
            &["--incidents-object", "incidents_all", "--boundaries-object", "mpct"],
        );

        let (_, incidents, boundaries) = load_sources(&args, &SimContext::new(1)).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(boundaries.len(), 1);
    }

    #[test]
    fn test_boundary_object_not_applied_to_incidents() {
        let (incidents, boundaries) = write_sources("scoped");
        let args = cli(&incidents, &boundaries, &["--boundaries-object", "mpct"]);
        assert!(load_sources(&args, &SimContext::new(1)).is_ok());

        let args = cli(&incidents, &boundaries, &["--incidents-object", "mpct"]);
        let err = load_sources(&args, &SimContext::new(1)).unwrap_err();
        assert!(matches!(err, SimError::Data(DataError::MissingObject(name)) if name == "mpct"));
    }
}
