//! Dataset families served by the clearinghouse download endpoint.

use std::fmt;

/// A clearinghouse dataset, selecting both the catalog to request and the
/// way its daily payloads are packaged.
///
/// One enum replaces a processor-class-per-dataset design: every variant
/// shares the same fetch loop and only differs in its query parameters and
/// payload handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Daily CHP incident reports: a zip archive wrapping gzip members.
    IncidentsDaily,
    /// 5-minute station flow measurements: a bare gzip stream per day.
    Flow5Min,
    /// Station metadata snapshots: plain tab-delimited text.
    StationMeta,
}

/// How a dataset's daily payload is packaged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Payload {
    /// Zip archive whose useful member is itself gzip-compressed.
    ZippedGzip,
    /// Response body is a single gzip stream.
    Gzip,
    /// Response body is the file itself.
    Plain,
}

impl Dataset {
    pub(crate) fn type_param(&self) -> &'static str {
        match self {
            Dataset::IncidentsDaily => "chp_incidents_day",
            Dataset::Flow5Min => "station_5min",
            Dataset::StationMeta => "meta",
        }
    }

    pub(crate) fn geotag(&self) -> &'static str {
        match self {
            Dataset::StationMeta => "null",
            Dataset::IncidentsDaily | Dataset::Flow5Min => "",
        }
    }

    pub(crate) fn payload(&self) -> Payload {
        match self {
            Dataset::IncidentsDaily => Payload::ZippedGzip,
            Dataset::Flow5Min => Payload::Gzip,
            Dataset::StationMeta => Payload::Plain,
        }
    }

    /// Subdirectory of the data directory this dataset's files land in.
    pub(crate) fn subdir(&self) -> &'static str {
        match self {
            Dataset::IncidentsDaily => "incidents",
            Dataset::Flow5Min => "flow",
            Dataset::StationMeta => "stations",
        }
    }
}

/// Formats a `Dataset` as its API `type` parameter.
///
/// # Examples
///
/// ```
/// use pems::Dataset;
///
/// assert_eq!(Dataset::IncidentsDaily.to_string(), "chp_incidents_day");
/// assert_eq!(format!("{}", Dataset::StationMeta), "meta");
/// ```
impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_param())
    }
}
