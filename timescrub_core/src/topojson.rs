//! TopoJSON decoding.
//!
//! The small-multiple sources ship as TopoJSON topologies: geometry is
//! stored as shared, optionally quantized and delta-encoded arcs. This
//! module expands a named object back into features with absolute
//! longitude/latitude coordinates and hands them to the same record
//! builders the GeoJSON path uses.

use crate::error::DataError;
use crate::geojson::{boundary_from_parts, incident_from_parts, text_value, Decoded};
use crate::incidents::{BoundaryCollection, IncidentCollection};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct RawTopology {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    transform: Option<Transform>,
    #[serde(default)]
    arcs: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    objects: Map<String, Value>,
}

/// Quantization transform: `absolute = quantized * scale + translate`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

impl Transform {
    fn apply(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: x * self.scale[0] + self.translate[0],
            y: y * self.scale[1] + self.translate[1],
        }
    }
}

/// A topology with its arcs expanded to absolute coordinates.
struct Topology {
    transform: Option<Transform>,
    arcs: Vec<Vec<Coord<f64>>>,
    objects: Map<String, Value>,
}

impl Topology {
    fn parse(json: &str) -> Result<Self, DataError> {
        let raw: RawTopology =
            serde_json::from_str(json).map_err(|e| DataError::parse("TopoJSON", e))?;
        if raw.ty != "Topology" {
            return Err(DataError::UnexpectedType {
                expected: "Topology",
                found: raw.ty,
            });
        }

        let arcs = raw
            .arcs
            .iter()
            .map(|arc| decode_arc(arc, raw.transform.as_ref()))
            .collect();

        Ok(Self {
            transform: raw.transform,
            arcs,
            objects: raw.objects,
        })
    }

    /// Looks up an object by name; with no name, takes the first object in
    /// document order.
    fn object(&self, name: Option<&str>) -> Result<&Value, DataError> {
        match name {
            Some(name) => self
                .objects
                .get(name)
                .ok_or_else(|| DataError::MissingObject(name.to_string())),
            None => self
                .objects
                .values()
                .next()
                .ok_or_else(|| DataError::MissingObject("<first>".to_string())),
        }
    }

    /// Flattens an object into its member geometries.
    fn members<'a>(&self, object: &'a Value) -> Vec<&'a Value> {
        match object.get("type").and_then(Value::as_str) {
            Some("GeometryCollection") => object
                .get("geometries")
                .and_then(Value::as_array)
                .map(|g| g.iter().collect())
                .unwrap_or_default(),
            _ => vec![object],
        }
    }

    fn geometry(&self, member: &Value) -> Option<Geometry<f64>> {
        let ty = member.get("type")?.as_str()?;
        match ty {
            "Point" => self.point(member.get("coordinates")?).map(Geometry::Point),
            "MultiPoint" => member
                .get("coordinates")?
                .as_array()?
                .iter()
                .map(|c| self.point(c))
                .collect::<Option<Vec<_>>>()
                .map(|p| Geometry::MultiPoint(MultiPoint::new(p))),
            "LineString" => self.line(member.get("arcs")?).map(Geometry::LineString),
            "MultiLineString" => member
                .get("arcs")?
                .as_array()?
                .iter()
                .map(|l| self.line(l))
                .collect::<Option<Vec<_>>>()
                .map(|l| Geometry::MultiLineString(MultiLineString::new(l))),
            "Polygon" => self.polygon(member.get("arcs")?).map(Geometry::Polygon),
            "MultiPolygon" => member
                .get("arcs")?
                .as_array()?
                .iter()
                .map(|p| self.polygon(p))
                .collect::<Option<Vec<_>>>()
                .map(|p| Geometry::MultiPolygon(MultiPolygon::new(p))),
            "GeometryCollection" => {
                let nested = member
                    .get("geometries")?
                    .as_array()?
                    .iter()
                    .filter_map(|g| self.geometry(g))
                    .collect::<Vec<_>>();
                Some(Geometry::GeometryCollection(nested.into()))
            }
            _ => None,
        }
    }

    /// Point coordinates are quantized but never delta-encoded.
    fn point(&self, value: &Value) -> Option<Point<f64>> {
        let array = value.as_array()?;
        let x = array.first()?.as_f64()?;
        let y = array.get(1)?.as_f64()?;
        let c = match &self.transform {
            Some(t) => t.apply(x, y),
            None => Coord { x, y },
        };
        Some(Point(c))
    }

    /// Stitches arc references into one line. Consecutive arcs share an
    /// endpoint, so the first point of each following arc is dropped.
    fn line(&self, refs: &Value) -> Option<LineString<f64>> {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for reference in refs.as_array()? {
            let index = reference.as_i64()?;
            let (arc, reversed) = if index < 0 {
                (self.arcs.get(usize::try_from(!index).ok()?)?, true)
            } else {
                (self.arcs.get(usize::try_from(index).ok()?)?, false)
            };

            if !coords.is_empty() {
                coords.pop();
            }
            if reversed {
                coords.extend(arc.iter().rev().copied());
            } else {
                coords.extend(arc.iter().copied());
            }
        }
        Some(LineString::new(coords))
    }

    fn polygon(&self, rings: &Value) -> Option<Polygon<f64>> {
        let mut rings = rings
            .as_array()?
            .iter()
            .map(|r| self.line(r))
            .collect::<Option<Vec<_>>>()?
            .into_iter();
        let exterior = rings.next()?;
        Some(Polygon::new(exterior, rings.collect()))
    }
}

/// Expands one arc; quantized arcs are delta-encoded.
fn decode_arc(arc: &[Vec<f64>], transform: Option<&Transform>) -> Vec<Coord<f64>> {
    let mut x = 0.0;
    let mut y = 0.0;
    arc.iter()
        .filter(|p| p.len() >= 2)
        .map(|p| match transform {
            Some(t) => {
                x += p[0];
                y += p[1];
                t.apply(x, y)
            }
            None => Coord { x: p[0], y: p[1] },
        })
        .collect()
}

/// Parses incident points from a TopoJSON object.
pub fn parse_incidents(
    json: &str,
    object: Option<&str>,
) -> Result<Decoded<IncidentCollection>, DataError> {
    let topology = Topology::parse(json)?;
    let members = topology.members(topology.object(object)?);
    let mut skipped = 0;
    let mut features = Vec::with_capacity(members.len());

    for member in members {
        let geometry = topology.geometry(member);
        let properties = member.get("properties").and_then(Value::as_object);
        match incident_from_parts(geometry, properties) {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }

    Ok(Decoded {
        items: IncidentCollection::new(features),
        skipped,
    })
}

/// Parses the polygon boundary set from a TopoJSON object.
pub fn parse_boundaries(
    json: &str,
    object: Option<&str>,
) -> Result<Decoded<BoundaryCollection>, DataError> {
    let topology = Topology::parse(json)?;
    let members = topology.members(topology.object(object)?);
    let mut skipped = 0;
    let mut features = Vec::with_capacity(members.len());

    for member in members {
        let id = member
            .get("properties")
            .and_then(|p| p.get("id"))
            .or_else(|| member.get("id"))
            .and_then(text_value);
        match boundary_from_parts(topology.geometry(member), id) {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }

    Ok(Decoded {
        items: BoundaryCollection::new(features),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Two unit squares sharing the edge x=1, quantized with scale 0.5.
    const SQUARES: &str = r#"{
        "type": "Topology",
        "transform": { "scale": [0.5, 0.5], "translate": [10, 20] },
        "arcs": [
            [[2, 0], [0, 2]],
            [[2, 2], [-2, 0], [0, -2], [2, 0]],
            [[2, 0], [2, 0], [0, 2], [-2, 0]]
        ],
        "objects": {
            "mpct": {
                "type": "GeometryCollection",
                "geometries": [
                    { "type": "Polygon", "arcs": [[0, 1]], "properties": { "id": 1 } },
                    { "type": "Polygon", "arcs": [[2, -1]], "properties": { "id": 2 } },
                    { "type": "Point", "coordinates": [0, 0] }
                ]
            }
        }
    }"#;

    #[test]
    fn test_decode_delta_arcs() {
        let t = Transform {
            scale: [0.5, 0.5],
            translate: [10.0, 20.0],
        };
        let arc = decode_arc(&[vec![2.0, 2.0], vec![-2.0, 0.0], vec![0.0, -2.0]], Some(&t));
        assert_eq!(arc.len(), 3);
        assert_relative_eq!(arc[0].x, 11.0);
        assert_relative_eq!(arc[0].y, 21.0);
        assert_relative_eq!(arc[1].x, 10.0);
        assert_relative_eq!(arc[2].y, 20.0);
    }

    #[test]
    fn test_parse_boundaries_stitches_shared_arcs() {
        let decoded = parse_boundaries(SQUARES, Some("mpct")).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.skipped, 1);

        let left = &decoded.items.iter().next().unwrap().geometry.0[0];
        let ring: Vec<_> = left.exterior().coords().copied().collect();
        // Arc 0 (2 pts) + arc 1 (4 pts) minus the shared joint = 5 points.
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_relative_eq!(ring[0].x, 11.0);
        assert_relative_eq!(ring[0].y, 20.0);
        assert_relative_eq!(ring[2].x, 10.0);
        assert_relative_eq!(ring[2].y, 21.0);

        let right = &decoded.items.iter().nth(1).unwrap();
        assert_eq!(right.id.as_deref(), Some("2"));
        let ring: Vec<_> = right.geometry.0[0].exterior().coords().copied().collect();
        // Reversed arc 0 walks x=1 downward back to the start.
        assert_relative_eq!(ring.last().unwrap().x, 11.0);
        assert_relative_eq!(ring.last().unwrap().y, 20.0);
    }

    #[test]
    fn test_parse_incidents_from_quantized_points() {
        let json = r#"{
            "type": "Topology",
            "transform": { "scale": [0.001, 0.001], "translate": [-93.3, 44.9] },
            "arcs": [],
            "objects": {
                "incidents_all": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Point", "coordinates": [100, 50],
                          "properties": { "index": 0, "date": 43979, "time": 2300, "type": "fire" } },
                        { "type": "Point", "coordinates": [200, 20],
                          "properties": { "index": 1, "date": 43980, "type": "police" } },
                        { "type": null, "properties": { "index": 2 } }
                    ]
                }
            }
        }"#;

        let decoded = parse_incidents(json, None).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.skipped, 1);

        let first = &decoded.items.features()[0];
        match first.geometry {
            Geometry::Point(p) => {
                assert_relative_eq!(p.x(), -93.2, epsilon = 1e-9);
                assert_relative_eq!(p.y(), 44.95, epsilon = 1e-9);
            }
            ref other => panic!("expected point, got {:?}", other),
        }
        assert!(first.date.matches_serial(43979));
    }

    #[test]
    fn test_unnamed_object_is_first_in_document() {
        let json = r#"{
            "type": "Topology",
            "arcs": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]],
            "objects": {
                "wards": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Polygon", "arcs": [[0]], "properties": { "id": 7 } },
                        { "type": "Polygon", "arcs": [[0]], "properties": { "id": 8 } }
                    ]
                },
                "airports": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Polygon", "arcs": [[0]], "properties": { "id": 1 } }
                    ]
                }
            }
        }"#;

        let decoded = parse_boundaries(json, None).unwrap();
        assert_eq!(decoded.items.len(), 2);
        assert_eq!(decoded.items.iter().next().unwrap().id.as_deref(), Some("7"));
    }

    #[test]
    fn test_missing_object_is_an_error() {
        let err = parse_boundaries(SQUARES, Some("precincts")).unwrap_err();
        assert!(matches!(err, DataError::MissingObject(name) if name == "precincts"));

        let err = parse_boundaries(r#"{ "type": "FeatureCollection" }"#, None).unwrap_err();
        assert!(matches!(err, DataError::UnexpectedType { expected: "Topology", .. }));
    }
}
