use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClearinghouseError {
    #[error("Session cookie is not a valid header value")]
    InvalidCookie(#[source] reqwest::header::InvalidHeaderValue),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Giving up on {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<ClearinghouseError>,
    },

    #[error("Catalog response has an unexpected shape")]
    MalformedCatalog(#[source] serde_json::Error),

    #[error("Response for {0} carries no Content-Disposition filename")]
    MissingContentDisposition(String),

    #[error("Failed to read archive '{0}'")]
    ArchiveRead(PathBuf, #[source] zip::result::ZipError),

    #[error("Archive '{archive}' has no entry without token '{token}'")]
    NoMatchingEntry { archive: String, token: String },

    #[error("Data download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
