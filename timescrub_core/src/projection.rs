//! The "SPACE" side of the snapshot panels - a fixed cartographic projection.
//!
//! Every panel uses the same projection so all panels are pixel-aligned to
//! the same geography. [`Mercator`] follows the d3 convention:
//!
//! ```text
//! x = tx + k * (λ - λ0)
//! y = ty - k * (ln tan(π/4 + φ/2) - ln tan(π/4 + φ0/2))
//! ```
//!
//! with `(λ0, φ0)` the configured center drawn at pixel `(tx, ty)`.

use crate::config::ProjectionConfig;
use geo::{Centroid, Coord, Geometry, MapCoords};
use std::f64::consts::FRAC_PI_4;

/// Mercator is undefined at the poles; latitudes are clamped to the
/// web-mercator limit.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Maps longitude/latitude degrees to drawing-surface pixels.
pub trait Projection {
    fn project(&self, coord: Coord<f64>) -> Coord<f64>;
}

/// Spherical Mercator with a fixed scale, center and translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    scale: f64,
    translate: Coord<f64>,
    /// Raw (unscaled) projection of the center
    center_raw: Coord<f64>,
}

impl Mercator {
    /// # Arguments
    /// * `scale` - pixels per radian
    /// * `center` - `[longitude, latitude]` in degrees
    /// * `translate` - pixel position of `center`
    pub fn new(scale: f64, center: [f64; 2], translate: [f64; 2]) -> Self {
        Self {
            scale,
            translate: Coord {
                x: translate[0],
                y: translate[1],
            },
            center_raw: raw(Coord {
                x: center[0],
                y: center[1],
            }),
        }
    }

    pub fn from_config(config: &ProjectionConfig) -> Self {
        Self::new(config.scale, config.center, config.translate)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Default for Mercator {
    fn default() -> Self {
        Self::from_config(&ProjectionConfig::default())
    }
}

impl Projection for Mercator {
    fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        let r = raw(coord);
        Coord {
            x: self.translate.x + self.scale * (r.x - self.center_raw.x),
            y: self.translate.y - self.scale * (r.y - self.center_raw.y),
        }
    }
}

/// Unscaled Mercator in radians.
fn raw(coord: Coord<f64>) -> Coord<f64> {
    let lambda = coord.x.to_radians();
    let phi = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Coord {
        x: lambda,
        y: (FRAC_PI_4 + phi / 2.0).tan().ln(),
    }
}

/// Projects every coordinate of a geometry.
pub fn project_geometry<P: Projection>(projection: &P, geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(|c| projection.project(c))
}

/// Planar centroid of the projected geometry, the point a marker is
/// drawn at. `None` for empty geometry.
pub fn projected_centroid<P: Projection>(projection: &P, geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    project_geometry(projection, geometry)
        .centroid()
        .map(|p| p.0)
}
