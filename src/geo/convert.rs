//! Building EPSG:4326 point layers out of tabular data.

use crate::geo::error::GeoError;
use chrono::DateTime;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use log::info;
use polars::prelude::*;
use std::path::Path;

/// Builds point features from a table's lon/lat columns.
///
/// Rows with a missing coordinate are dropped. Coordinate pairs that cannot
/// form a well-formed point (unparsable, non-finite, or outside geographic
/// range) are dropped too; in clean data that second filter never fires.
/// Every column of a surviving row is carried over as a feature property.
/// Coordinates are interpreted as EPSG:4326 longitude/latitude, the GeoJSON
/// native reference system.
pub fn points_from_frame(
    df: &DataFrame,
    lon_column: &str,
    lat_column: &str,
) -> Result<FeatureCollection, GeoError> {
    for column in [lon_column, lat_column] {
        if df.column(column).is_err() {
            return Err(GeoError::MissingColumn(column.to_string()));
        }
    }

    let with_coords = df
        .clone()
        .lazy()
        .filter(col(lon_column).is_not_null().and(col(lat_column).is_not_null()))
        .collect()?;

    let lon_series = with_coords
        .column(lon_column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let lat_series = with_coords
        .column(lat_column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let lon = lon_series.f64()?;
    let lat = lat_series.f64()?;

    let names: Vec<String> = with_coords
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = with_coords.get_columns();

    let mut features = Vec::with_capacity(with_coords.height());
    let mut degenerate = 0usize;
    for row in 0..with_coords.height() {
        let (Some(x), Some(y)) = (lon.get(row), lat.get(row)) else {
            degenerate += 1;
            continue;
        };
        if !is_point_coordinate(x, y) {
            degenerate += 1;
            continue;
        }
        let mut properties = JsonObject::new();
        for (name, column) in names.iter().zip(columns) {
            let value = column.as_materialized_series().get(row)?;
            properties.insert(name.clone(), json_value(value));
        }
        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![x, y]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    if degenerate > 0 {
        info!("Dropped {degenerate} rows without a well-formed point geometry");
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Persists a feature collection as a GeoJSON file.
pub fn write_feature_collection(
    features: &FeatureCollection,
    path: &Path,
) -> Result<(), GeoError> {
    let json = serde_json::to_string(features).map_err(GeoError::Serialize)?;
    std::fs::write(path, json).map_err(|e| GeoError::Io(path.to_path_buf(), e))?;
    Ok(())
}

fn is_point_coordinate(lon: f64, lat: f64) -> bool {
    lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
}

fn json_value(value: AnyValue) -> JsonValue {
    match value {
        AnyValue::Null => JsonValue::Null,
        AnyValue::Boolean(v) => JsonValue::from(v),
        AnyValue::Int32(v) => JsonValue::from(v),
        AnyValue::Int64(v) => JsonValue::from(v),
        AnyValue::UInt32(v) => JsonValue::from(v),
        AnyValue::UInt64(v) => JsonValue::from(v),
        AnyValue::Float32(v) => JsonValue::from(v),
        AnyValue::Float64(v) => JsonValue::from(v),
        AnyValue::String(v) => JsonValue::from(v),
        AnyValue::StringOwned(v) => JsonValue::from(v.as_str()),
        AnyValue::Datetime(timestamp, unit, _) => datetime_json(timestamp, unit),
        AnyValue::DatetimeOwned(timestamp, unit, _) => datetime_json(timestamp, unit),
        other => JsonValue::from(other.to_string()),
    }
}

fn datetime_json(timestamp: i64, unit: TimeUnit) -> JsonValue {
    let datetime = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(timestamp),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(timestamp),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(timestamp)),
    };
    datetime
        .map(|dt| JsonValue::from(dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()))
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "Lon" => [Some("-122.27"), None, Some("500.0"), Some("junk")],
            "Lat" => [Some("37.80"), Some("37.70"), Some("37.70"), Some("37.70")],
            "District" => ["4", "4", "7", "4"],
        )
        .unwrap()
    }

    #[test]
    fn drops_missing_and_degenerate_coordinates() {
        let features = points_from_frame(&sample_frame(), "Lon", "Lat").unwrap();
        assert_eq!(features.features.len(), 1);

        let feature = &features.features[0];
        match &feature.geometry.as_ref().unwrap().value {
            geojson::Value::Point(coords) => {
                assert!((coords[0] + 122.27).abs() < 1e-9);
                assert!((coords[1] - 37.80).abs() < 1e-9);
            }
            other => panic!("expected a point geometry, got {other:?}"),
        }
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties.get("District"), Some(&JsonValue::from("4")));
        assert_eq!(properties.get("Lon"), Some(&JsonValue::from("-122.27")));
    }

    #[test]
    fn missing_coordinate_column_is_fatal() {
        let result = points_from_frame(&sample_frame(), "Longitude", "Lat");
        assert!(matches!(result, Err(GeoError::MissingColumn(name)) if name == "Longitude"));
    }

    #[test]
    fn written_collection_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.geojson");
        let features = points_from_frame(&sample_frame(), "Lon", "Lat").unwrap();

        write_feature_collection(&features, &path).unwrap();
        let reloaded = crate::geo::clip::load_feature_collection(&path).unwrap();
        assert_eq!(reloaded.features.len(), features.features.len());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(is_point_coordinate(-122.27, 37.80));
        assert!(!is_point_coordinate(500.0, 37.80));
        assert!(!is_point_coordinate(-122.27, 95.0));
        assert!(!is_point_coordinate(f64::NAN, 37.80));
    }
}
