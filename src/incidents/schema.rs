//! Column layout of the daily CHP incident reports.

/// Column names of the headerless 19-column daily incident files, in file
/// order.
pub const INCIDENT_COLUMNS: [&str; 19] = [
    "CC Code",
    "Incident Number",
    "Timestamp",
    "Description",
    "Location",
    "Area",
    "Zoom Map",
    "TB xy",
    "Lat",
    "Lon",
    "District",
    "County FIPS ID",
    "City FIPS ID",
    "Freeway Number",
    "Freeway Direction",
    "State Postmile",
    "Absolute Postmile",
    "Severity",
    "Duration/min",
];

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const DURATION_COLUMN: &str = "Duration/min";
pub const LAT_COLUMN: &str = "Lat";
pub const LON_COLUMN: &str = "Lon";

/// Timestamp layout used by the daily report files.
pub(crate) const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// CHP description-code prefixes that mark collision-type incidents.
pub const ACCIDENT_CODES: [&str; 6] = ["1179", "1181", "1182", "1183", "20001", "20002"];
