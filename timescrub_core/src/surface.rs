//! Drawing surfaces for snapshot panels.
//!
//! A [`DrawingSurface`] receives geometry that is already projected to
//! pixels. [`SvgSurface`] accumulates elements and serializes them as an
//! SVG document; [`SurfaceRegistry`] hands surfaces out by selector.

use crate::error::SnapshotError;
use geo::{Coord, LineString, MultiPolygon};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Paint for boundary outlines.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStyle {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
}

/// Paint for incident markers.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleStyle {
    pub fill: String,
}

/// A pixel-space canvas a panel draws into.
pub trait DrawingSurface: Send {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// Removes everything previously drawn.
    fn clear(&mut self);

    /// Draws a projected (multi)polygon. `id` is the boundary's id, if any.
    fn draw_path(&mut self, path: &MultiPolygon<f64>, id: Option<&str>, style: &PathStyle);

    fn draw_circle(&mut self, center: Coord<f64>, radius: f64, style: &CircleStyle);
}

/// Finds the drawing surface behind a selector string.
pub trait SurfaceLocator {
    type Surface: DrawingSurface;

    fn locate(&mut self, selector: &str) -> Result<Self::Surface, SnapshotError>;
}

#[derive(Debug, Clone, PartialEq)]
enum SvgElement {
    Path {
        d: String,
        id: Option<String>,
        style: PathStyle,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        style: CircleStyle,
    },
}

/// In-memory SVG canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgSurface {
    width: f64,
    height: f64,
    elements: Vec<SvgElement>,
}

impl SvgSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            elements: Vec::new(),
        }
    }

    pub fn path_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, SvgElement::Path { .. }))
            .count()
    }

    pub fn circle_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, SvgElement::Circle { .. }))
            .count()
    }

    /// Centers of every drawn circle, in draw order.
    pub fn circle_centers(&self) -> Vec<Coord<f64>> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                SvgElement::Circle { cx, cy, .. } => Some(Coord { x: *cx, y: *cy }),
                SvgElement::Path { .. } => None,
            })
            .collect()
    }

    /// Serializes the surface as a standalone SVG document.
    ///
    /// Boundaries go in one group, markers in a second group drawn on top.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}">"#,
            self.width, self.height
        );
        out.push_str("<g>\n<g class=\"counties\">\n");
        for element in &self.elements {
            if let SvgElement::Path { d, id, style } = element {
                let (class, id_attr) = match id {
                    Some(id) => (format!("county C{}", id), format!(r#" id="P{}""#, id)),
                    None => ("county".to_string(), String::new()),
                };
                let _ = writeln!(
                    out,
                    r#"<path d="{}" class="{}"{} style="stroke-width:{};stroke:{};fill:{}"/>"#,
                    d, class, id_attr, style.stroke_width, style.stroke, style.fill
                );
            }
        }
        out.push_str("</g>\n<g>\n");
        for element in &self.elements {
            if let SvgElement::Circle { cx, cy, r, style } = element {
                let _ = writeln!(
                    out,
                    r#"<circle transform="translate({:.3},{:.3})" r="{}" style="fill:{}"/>"#,
                    cx, cy, r, style.fill
                );
            }
        }
        out.push_str("</g>\n</g>\n</svg>\n");
        out
    }

    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_svg())
    }
}

impl DrawingSurface for SvgSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    fn draw_path(&mut self, path: &MultiPolygon<f64>, id: Option<&str>, style: &PathStyle) {
        let d = path_data(path);
        if d.is_empty() {
            return;
        }
        self.elements.push(SvgElement::Path {
            d,
            id: id.map(str::to_string),
            style: style.clone(),
        });
    }

    fn draw_circle(&mut self, center: Coord<f64>, radius: f64, style: &CircleStyle) {
        self.elements.push(SvgElement::Circle {
            cx: center.x,
            cy: center.y,
            r: radius,
            style: style.clone(),
        });
    }
}

/// SVG path data, one closed subpath per ring.
fn path_data(path: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in path.iter() {
        ring_data(&mut d, polygon.exterior());
        for interior in polygon.interiors() {
            ring_data(&mut d, interior);
        }
    }
    d
}

fn ring_data(d: &mut String, ring: &LineString<f64>) {
    for (i, c) in ring.coords().enumerate() {
        let command = if i == 0 { 'M' } else { 'L' };
        let _ = write!(d, "{}{:.3},{:.3}", command, c.x, c.y);
    }
    if ring.coords().next().is_some() {
        d.push('Z');
    }
}

/// Surfaces registered by selector. Each can be claimed by one panel.
#[derive(Debug, Default)]
pub struct SurfaceRegistry<S> {
    surfaces: HashMap<String, Option<S>>,
}

impl<S> SurfaceRegistry<S> {
    pub fn new() -> Self {
        Self {
            surfaces: HashMap::new(),
        }
    }

    pub fn register(&mut self, selector: impl Into<String>, surface: S) {
        self.surfaces.insert(selector.into(), Some(surface));
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.surfaces.contains_key(selector)
    }
}

impl SurfaceRegistry<SvgSurface> {
    /// Registers one blank SVG surface per selector.
    pub fn with_svg(selectors: &[&str], width: f64, height: f64) -> Self {
        let mut registry = Self::new();
        for selector in selectors {
            registry.register(*selector, SvgSurface::new(width, height));
        }
        registry
    }
}

impl<S: DrawingSurface> SurfaceLocator for SurfaceRegistry<S> {
    type Surface = S;

    fn locate(&mut self, selector: &str) -> Result<S, SnapshotError> {
        match self.surfaces.get_mut(selector) {
            None => Err(SnapshotError::SurfaceNotFound(selector.to_string())),
            Some(slot) => {
                let surface = slot
                    .take()
                    .ok_or_else(|| SnapshotError::SurfaceInUse(selector.to_string()))?;
                debug!(selector, "surface claimed");
                Ok(surface)
            }
        }
    }
}
