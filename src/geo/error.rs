use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Required column '{0}' not found in table")]
    MissingColumn(String),

    #[error("I/O error for '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("'{0}' is not valid GeoJSON")]
    ParseGeoJson(PathBuf, #[source] geojson::Error),

    #[error("'{0}' does not hold a feature collection")]
    NotAFeatureCollection(PathBuf),

    #[error("Failed to serialize feature collection")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed processing DataFrame: {0}")]
    DataFrame(#[from] PolarsError),
}
