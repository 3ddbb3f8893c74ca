use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationMetaError {
    #[error("Failed to scan data directory '{0}'")]
    ReadDir(PathBuf, #[source] std::io::Error),

    #[error("No station metadata files found under '{0}'")]
    NoMetaFiles(PathBuf),

    #[error("Parsing error reading station metadata '{path}'")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("I/O error writing merged stations '{path}'")]
    CsvWriteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error writing merged stations '{path}'")]
    CsvWritePolars {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrame(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
