//! Unit polygons from GeoJSON.
//!
//! Geometries are carried opaquely; only the feature property naming the
//! unit code is interpreted.

use serde_json::Value;
use sta_common::{Error, Result, UnitCode};
use std::collections::HashSet;
use std::io::Read;

/// Polygon features keyed by unit code, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSet {
    units: Vec<UnitCode>,
    features: Vec<Value>,
}

impl PolygonSet {
    /// Build from parallel unit codes and features. Codes must be unique.
    pub fn new(units: Vec<UnitCode>, features: Vec<Value>) -> Result<Self> {
        if units.len() != features.len() {
            return Err(Error::ShapeMismatch {
                what: "polygon features".to_string(),
                expected: units.len(),
                actual: features.len(),
            });
        }
        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            if !seen.insert(unit.as_str()) {
                return Err(Error::DuplicateKey {
                    table: "polygons".to_string(),
                    key: unit.to_string(),
                });
            }
        }
        Ok(PolygonSet { units, features })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[UnitCode] {
        &self.units
    }

    pub fn features(&self) -> &[Value] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitCode, &Value)> {
        self.units.iter().zip(&self.features)
    }
}

/// Load a GeoJSON FeatureCollection, taking each unit code from the
/// `unit_property` feature property.
///
/// Numeric property values are accepted and converted to strings.
pub fn read_polygons<R: Read>(input: R, source: &str, unit_property: &str) -> Result<PolygonSet> {
    let doc: Value = serde_json::from_reader(input)
        .map_err(|e| Error::parse(source, Some(e.line() as u64), e.to_string()))?;

    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(Error::parse(source, None, "expected a GeoJSON FeatureCollection"));
    }
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse(source, None, "FeatureCollection has no features array"))?;

    let mut units = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        let code = match feature.get("properties").and_then(|p| p.get(unit_property)) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::parse(
                    source,
                    None,
                    format!("feature {} has no '{}' property", i + 1, unit_property),
                ))
            }
        };
        units.push(UnitCode::from(code));
    }

    PolygonSet::new(units, features.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"code": "A", "name": "North"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"code": 17},
             "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
        ]
    }"#;

    #[test]
    fn test_read_polygons() {
        let polygons = read_polygons(TWO_SQUARES.as_bytes(), "p.geojson", "code").unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons.units()[0].as_str(), "A");
        assert_eq!(polygons.units()[1].as_str(), "17");
        assert_eq!(polygons.features()[0]["properties"]["name"], "North");
    }

    #[test]
    fn test_missing_property() {
        let err = read_polygons(TWO_SQUARES.as_bytes(), "p.geojson", "msoa").unwrap_err();
        assert!(err.to_string().contains("'msoa'"));
    }

    #[test]
    fn test_not_a_feature_collection() {
        let err = read_polygons(r#"{"type": "Feature"}"#.as_bytes(), "p.geojson", "code").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(read_polygons("not json".as_bytes(), "p.geojson", "code").is_err());
    }

    #[test]
    fn test_duplicate_codes() {
        let features = vec![Value::Null, Value::Null];
        let err = PolygonSet::new(vec![UnitCode::from("A"), UnitCode::from("A")], features)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }
}
