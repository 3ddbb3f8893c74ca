mod clearinghouse;
mod error;
mod geo;
mod incidents;
mod pems;
mod stations;
mod types;

pub use error::PemsError;
pub use pems::*;

pub use clearinghouse::archive::{FetchOutcome, FetchReport, DEFAULT_FILTER_TOKEN};
pub use clearinghouse::catalog::{Catalog, CatalogEntry};
pub use clearinghouse::error::ClearinghouseError;

pub use incidents::error::IncidentDataError;
pub use incidents::filter::{select_accidents, with_min_duration};
pub use incidents::merge::{merge_daily_reports, read_merged, write_merged, MERGED_REPORTS_FILE};
pub use incidents::schema::{ACCIDENT_CODES, INCIDENT_COLUMNS};

pub use stations::error::StationMetaError;
pub use stations::meta::{merge_station_meta, MERGED_STATIONS_FILE};

pub use geo::clip::{clip_to_district, load_feature_collection, DISTRICT_PROPERTY};
pub use geo::convert::{points_from_frame, write_feature_collection};
pub use geo::error::GeoError;

pub use types::dataset::Dataset;
pub use types::month::{InvalidMonth, MonthFilter};
