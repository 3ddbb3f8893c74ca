use crate::clearinghouse::error::ClearinghouseError;
use crate::geo::error::GeoError;
use crate::incidents::error::IncidentDataError;
use crate::stations::error::StationMetaError;
use crate::types::month::InvalidMonth;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PemsError {
    #[error(transparent)]
    Clearinghouse(#[from] ClearinghouseError),

    #[error(transparent)]
    IncidentData(#[from] IncidentDataError),

    #[error(transparent)]
    StationMeta(#[from] StationMetaError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    InvalidMonth(#[from] InvalidMonth),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),
}
