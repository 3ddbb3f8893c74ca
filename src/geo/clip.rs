//! Loading feature collections and clipping them to a district.

use crate::geo::error::GeoError;
use geojson::{Feature, FeatureCollection, GeoJson};
use std::path::Path;

/// Property carrying the administrative district of a feature.
pub const DISTRICT_PROPERTY: &str = "District";

/// Loads a GeoJSON feature collection from disk.
pub fn load_feature_collection(path: &Path) -> Result<FeatureCollection, GeoError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| GeoError::Io(path.to_path_buf(), e))?;
    let geojson = contents
        .parse::<GeoJson>()
        .map_err(|e| GeoError::ParseGeoJson(path.to_path_buf(), e))?;
    FeatureCollection::try_from(geojson)
        .map_err(|_| GeoError::NotAFeatureCollection(path.to_path_buf()))
}

/// Keeps features whose district attribute equals `district`.
///
/// The attribute may be numeric or a numeric string depending on how the
/// table was serialized; both representations match. Features are already
/// geographic (EPSG:4326), so no re-projection is involved.
pub fn clip_to_district(features: &FeatureCollection, district: u32) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features
            .features
            .iter()
            .filter(|feature| district_matches(feature, district))
            .cloned()
            .collect(),
        foreign_members: None,
    }
}

fn district_matches(feature: &Feature, district: u32) -> bool {
    let value = feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(DISTRICT_PROPERTY));
    match value {
        Some(serde_json::Value::Number(number)) => number.as_f64() == Some(f64::from(district)),
        Some(serde_json::Value::String(raw)) => {
            raw.trim().parse::<f64>().ok() == Some(f64::from(district))
        }
        _ => false,
    }
}
