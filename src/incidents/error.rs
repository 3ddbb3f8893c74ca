use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncidentDataError {
    #[error("Failed to scan data directory '{0}'")]
    ReadDir(PathBuf, #[source] std::io::Error),

    #[error("No daily report files found under '{0}'")]
    NoDailyFiles(PathBuf),

    #[error("Parsing error reading daily report '{path}'")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Daily report '{path}' has {found} columns, expected {expected}")]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("I/O error writing merged table '{path}'")]
    CsvWriteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error writing merged table '{path}'")]
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
