//! Loading source collections from disk.
//!
//! Files may be GeoJSON `FeatureCollection`s or TopoJSON `Topology`
//! documents; the format is detected from the top-level `type`.

use crate::error::DataError;
use crate::geojson::{self, Decoded};
use crate::incidents::{BoundaryCollection, IncidentCollection};
use crate::topojson;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Interchange format of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    TopoJson,
}

#[derive(Deserialize)]
struct Probe {
    #[serde(rename = "type")]
    ty: String,
}

impl SourceFormat {
    /// Detects the format from the document's `type` member.
    pub fn detect(json: &str) -> Result<Self, DataError> {
        let probe: Probe =
            serde_json::from_str(json).map_err(|e| DataError::parse("source document", e))?;
        match probe.ty.as_str() {
            "FeatureCollection" => Ok(SourceFormat::GeoJson),
            "Topology" => Ok(SourceFormat::TopoJson),
            _ => Err(DataError::UnexpectedType {
                expected: "FeatureCollection or Topology",
                found: probe.ty,
            }),
        }
    }
}

fn read(path: &Path) -> Result<String, DataError> {
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn report<T>(path: &Path, kind: &str, decoded: &Decoded<T>, len: usize) {
    if decoded.skipped > 0 {
        warn!(
            path = %path.display(),
            kind,
            skipped = decoded.skipped,
            "skipped malformed records"
        );
    }
    info!(path = %path.display(), kind, features = len, "source loaded");
}

/// Parses incidents from a document of either format.
///
/// `object` selects the TopoJSON object; it is ignored for GeoJSON.
pub fn parse_incidents(
    json: &str,
    object: Option<&str>,
) -> Result<Decoded<IncidentCollection>, DataError> {
    match SourceFormat::detect(json)? {
        SourceFormat::GeoJson => geojson::parse_incidents(json),
        SourceFormat::TopoJson => topojson::parse_incidents(json, object),
    }
}

/// Parses boundaries from a document of either format.
pub fn parse_boundaries(
    json: &str,
    object: Option<&str>,
) -> Result<Decoded<BoundaryCollection>, DataError> {
    match SourceFormat::detect(json)? {
        SourceFormat::GeoJson => geojson::parse_boundaries(json),
        SourceFormat::TopoJson => topojson::parse_boundaries(json, object),
    }
}

/// Reads and decodes an incident file, logging skipped records.
pub fn load_incidents(path: &Path, object: Option<&str>) -> Result<IncidentCollection, DataError> {
    let decoded = parse_incidents(&read(path)?, object)?;
    report(path, "incidents", &decoded, decoded.items.len());
    Ok(decoded.items)
}

/// Reads and decodes a boundary file, logging skipped records.
pub fn load_boundaries(path: &Path, object: Option<&str>) -> Result<BoundaryCollection, DataError> {
    let decoded = parse_boundaries(&read(path)?, object)?;
    report(path, "boundaries", &decoded, decoded.items.len());
    Ok(decoded.items)
}
