//! Attribute filters over incident feature collections.

use crate::incidents::schema::{ACCIDENT_CODES, DESCRIPTION_COLUMN, DURATION_COLUMN};
use geojson::{Feature, FeatureCollection};

/// Keeps features whose description code marks a collision-type incident.
///
/// The match is case-sensitive and anchored at the start of the field; a
/// feature without a description never matches.
pub fn select_accidents(features: &FeatureCollection) -> FeatureCollection {
    retain(features, |feature| {
        property_str(feature, DESCRIPTION_COLUMN)
            .map(|description| ACCIDENT_CODES.iter().any(|code| description.starts_with(code)))
            .unwrap_or(false)
    })
}

/// Keeps features whose duration is at least `min_minutes`.
///
/// A missing or unparsable duration counts as zero, so any positive
/// threshold excludes it.
pub fn with_min_duration(features: &FeatureCollection, min_minutes: f64) -> FeatureCollection {
    retain(features, |feature| duration_minutes(feature) >= min_minutes)
}

fn retain(
    features: &FeatureCollection,
    keep: impl Fn(&Feature) -> bool,
) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features
            .features
            .iter()
            .filter(|feature| keep(feature))
            .cloned()
            .collect(),
        foreign_members: None,
    }
}

fn property_str<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    feature.properties.as_ref()?.get(key)?.as_str()
}

fn duration_minutes(feature: &Feature) -> f64 {
    let value = feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(DURATION_COLUMN));
    match value {
        Some(serde_json::Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(raw)) => raw.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
