//! Seeded synthetic datasets.
//!
//! Generates an incident collection shaped like the published data:
//! - `index` increases in load order but skips values (gaps)
//! - `date` is a day serial that advances with `index`
//! - `time` is HHMM, occasionally missing
//! - a mix of fire / police / shots plus uncategorized records
//!
//! Boundaries are a square grid around the projection center.

use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use timescrub_core::{
    BoundaryCollection, BoundaryFeature, DateKey, IncidentCollection, IncidentFeature, IncidentKind,
};

/// Shape of a synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of incident records
    pub incidents: usize,

    /// First day serial (default: 43979, May 28 2020)
    pub first_date: i64,

    /// Number of distinct days the incidents span
    pub days: usize,

    /// Probability that the next index skips ahead
    pub gap_probability: f64,

    /// Fraction of records with no usable time
    pub missing_time_probability: f64,

    /// `[longitude, latitude]` the data clusters around
    pub center: [f64; 2],

    /// Half-width of the scatter, in degrees
    pub spread_deg: f64,

    /// Boundary grid is `grid × grid` cells
    pub grid: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            incidents: 200,
            first_date: 43979,
            days: 5,
            gap_probability: 0.1,
            missing_time_probability: 0.05,
            center: [-93.070335, 44.930977],
            spread_deg: 0.05,
            grid: 4,
        }
    }
}

/// Incidents plus boundaries generated from one seed.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub incidents: IncidentCollection,
    pub boundaries: BoundaryCollection,
}

/// Generates a complete dataset. The same seed and config always yield
/// the same data.
pub fn generate(seed: u64, config: &SyntheticConfig) -> SyntheticDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    SyntheticDataset {
        incidents: generate_incidents(&mut rng, config),
        boundaries: generate_boundaries(config),
    }
}

/// Generates the incident collection from the given RNG.
pub fn generate_incidents<R: Rng>(rng: &mut R, config: &SyntheticConfig) -> IncidentCollection {
    let days = config.days.max(1);
    let per_day = config.incidents.div_ceil(days).max(1);
    let mut index: i64 = 0;

    (0..config.incidents)
        .map(|n| {
            if n > 0 {
                index += if rng.gen_bool(config.gap_probability.clamp(0.0, 1.0)) {
                    rng.gen_range(2..=4)
                } else {
                    1
                };
            }

            let day = (n / per_day) as i64;
            let time = if rng.gen_bool(config.missing_time_probability.clamp(0.0, 1.0)) {
                None
            } else {
                let hour: i64 = rng.gen_range(0..24);
                let minute: i64 = rng.gen_range(0..60);
                Some(hour * 100 + minute)
            };

            let kind = match rng.gen_range(0..10) {
                0..=3 => IncidentKind::Fire,
                4..=6 => IncidentKind::Police,
                7..=8 => IncidentKind::Shots,
                _ => IncidentKind::Other("311".to_string()),
            };

            let lon = config.center[0] + rng.gen_range(-config.spread_deg..=config.spread_deg);
            let lat = config.center[1] + rng.gen_range(-config.spread_deg..=config.spread_deg);

            IncidentFeature {
                index,
                date: DateKey::new((config.first_date + day).to_string()),
                time,
                kind,
                geometry: Geometry::Point(Point::new(lon, lat)),
            }
        })
        .collect()
}

/// A `grid × grid` set of square cells covering the scatter extent.
pub fn generate_boundaries(config: &SyntheticConfig) -> BoundaryCollection {
    let grid = config.grid.max(1);
    let cell = 2.0 * config.spread_deg / grid as f64;
    let west = config.center[0] - config.spread_deg;
    let south = config.center[1] - config.spread_deg;

    (0..grid * grid)
        .map(|i| {
            let x0 = west + (i % grid) as f64 * cell;
            let y0 = south + (i / grid) as f64 * cell;
            let ring = LineString::new(vec![
                Coord { x: x0, y: y0 },
                Coord { x: x0 + cell, y: y0 },
                Coord { x: x0 + cell, y: y0 + cell },
                Coord { x: x0, y: y0 + cell },
                Coord { x: x0, y: y0 },
            ]);
            BoundaryFeature {
                id: Some(i.to_string()),
                geometry: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
            }
        })
        .collect()
}
