//! GeoJSON decoding into the incident and boundary collections.
//!
//! Decoding is tolerant per record: a feature without a usable `index` or
//! geometry is skipped and counted in [`Decoded::skipped`] instead of
//! failing the whole document.

use crate::error::DataError;
use crate::incidents::{
    BoundaryCollection, BoundaryFeature, DateKey, IncidentCollection, IncidentFeature, IncidentKind,
};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Result of decoding a collection: the usable items plus how many
/// records were dropped as malformed.
#[derive(Debug, Clone, Default)]
pub struct Decoded<T> {
    pub items: T,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    features: Vec<Value>,
}

/// Parses a GeoJSON `FeatureCollection` of incident points.
pub fn parse_incidents(json: &str) -> Result<Decoded<IncidentCollection>, DataError> {
    let raw = parse_collection(json)?;
    let mut skipped = 0;
    let mut features = Vec::with_capacity(raw.features.len());

    for value in &raw.features {
        let geometry = value.get("geometry").and_then(geometry_from_value);
        match incident_from_parts(geometry, properties_of(value)) {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }

    Ok(Decoded {
        items: IncidentCollection::new(features),
        skipped,
    })
}

/// Parses a GeoJSON `FeatureCollection` of (multi)polygons.
pub fn parse_boundaries(json: &str) -> Result<Decoded<BoundaryCollection>, DataError> {
    let raw = parse_collection(json)?;
    let mut skipped = 0;
    let mut features = Vec::with_capacity(raw.features.len());

    for value in &raw.features {
        let geometry = value.get("geometry").and_then(geometry_from_value);
        let id = properties_of(value)
            .and_then(|p| p.get("id"))
            .or_else(|| value.get("id"))
            .and_then(text_value);
        match boundary_from_parts(geometry, id) {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }

    Ok(Decoded {
        items: BoundaryCollection::new(features),
        skipped,
    })
}

fn parse_collection(json: &str) -> Result<RawCollection, DataError> {
    let raw: RawCollection =
        serde_json::from_str(json).map_err(|e| DataError::parse("GeoJSON", e))?;
    if raw.ty != "FeatureCollection" {
        return Err(DataError::UnexpectedType {
            expected: "FeatureCollection",
            found: raw.ty,
        });
    }
    Ok(raw)
}

fn properties_of(feature: &Value) -> Option<&Map<String, Value>> {
    feature.get("properties").and_then(Value::as_object)
}

// =============================================================================
// RECORD BUILDERS (shared with TopoJSON)
// =============================================================================

/// Builds an incident from decoded geometry and its property bag.
///
/// Returns `None` when the record has no geometry or no integer `index`.
pub(crate) fn incident_from_parts(
    geometry: Option<Geometry<f64>>,
    properties: Option<&Map<String, Value>>,
) -> Option<IncidentFeature> {
    let geometry = geometry?;
    let properties = properties?;
    let index = properties.get("index").and_then(integer_value)?;

    let date = properties
        .get("date")
        .and_then(text_value)
        .map(DateKey::new)
        .unwrap_or_default();
    let time = properties.get("time").and_then(integer_value);
    let kind = properties
        .get("type")
        .and_then(text_value)
        .map(IncidentKind::from)
        .unwrap_or_else(|| IncidentKind::Other(String::new()));

    Some(IncidentFeature {
        index,
        date,
        time,
        kind,
        geometry,
    })
}

/// Builds a boundary; only polygonal geometry is accepted.
pub(crate) fn boundary_from_parts(
    geometry: Option<Geometry<f64>>,
    id: Option<String>,
) -> Option<BoundaryFeature> {
    let geometry = match geometry? {
        Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
        Geometry::MultiPolygon(multi) => multi,
        _ => return None,
    };
    Some(BoundaryFeature { id, geometry })
}

/// Reads an integer from a JSON number or numeric string.
///
/// Integral floats (`930.0`) are accepted; fractional values are not.
pub(crate) fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Reads a string property, rendering numbers as their JSON text.
pub(crate) fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Converts a GeoJSON geometry object into a `geo` geometry.
pub(crate) fn geometry_from_value(value: &Value) -> Option<Geometry<f64>> {
    let ty = value.get("type")?.as_str()?;
    if ty == "GeometryCollection" {
        let members = value
            .get("geometries")?
            .as_array()?
            .iter()
            .filter_map(geometry_from_value)
            .collect::<Vec<_>>();
        return Some(Geometry::GeometryCollection(members.into()));
    }

    let coordinates = value.get("coordinates")?;
    match ty {
        "Point" => coord(coordinates).map(|c| Geometry::Point(Point(c))),
        "MultiPoint" => points(coordinates).map(|p| Geometry::MultiPoint(MultiPoint::new(p))),
        "LineString" => line(coordinates).map(Geometry::LineString),
        "MultiLineString" => lines(coordinates).map(|l| Geometry::MultiLineString(MultiLineString::new(l))),
        "Polygon" => polygon(coordinates).map(Geometry::Polygon),
        "MultiPolygon" => polygons(coordinates).map(|p| Geometry::MultiPolygon(MultiPolygon::new(p))),
        _ => None,
    }
}

/// `[lon, lat, ...]` -> `Coord`; extra dimensions are ignored.
pub(crate) fn coord(value: &Value) -> Option<Coord<f64>> {
    let array = value.as_array()?;
    let x = array.first()?.as_f64()?;
    let y = array.get(1)?.as_f64()?;
    Some(Coord { x, y })
}

fn points(value: &Value) -> Option<Vec<Point<f64>>> {
    value.as_array()?.iter().map(|c| coord(c).map(Point)).collect()
}

fn line(value: &Value) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(coord)
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

fn lines(value: &Value) -> Option<Vec<LineString<f64>>> {
    value.as_array()?.iter().map(line).collect()
}

fn polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = lines(value)?.into_iter();
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn polygons(value: &Value) -> Option<Vec<Polygon<f64>>> {
    value.as_array()?.iter().map(polygon).collect()
}
