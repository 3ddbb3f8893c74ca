//! Merging station metadata snapshots into one deduplicated table.

use crate::stations::error::StationMetaError;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File the merged station table is checkpointed to.
pub const MERGED_STATIONS_FILE: &str = "total_stations.csv";

/// Coordinate columns carried by the station metadata snapshots.
pub const STATION_LON_COLUMN: &str = "Longitude";
pub const STATION_LAT_COLUMN: &str = "Latitude";

const STATION_ID_COLUMN: &str = "ID";

/// Reads every tab-delimited station metadata snapshot under `dir` and
/// merges them, keeping the first row seen for each station ID.
///
/// Unlike the incident merge, snapshots overlap heavily across days, so
/// deduplication on the station ID is part of the contract here.
pub fn merge_station_meta(dir: &Path) -> Result<DataFrame, StationMetaError> {
    let files = meta_files(dir)?;
    if files.is_empty() {
        return Err(StationMetaError::NoMetaFiles(dir.to_path_buf()));
    }

    let mut frames = Vec::with_capacity(files.len());
    for path in &files {
        frames.push(read_meta_snapshot(path)?.lazy());
        info!("Merged {}", path.display());
    }

    let merged = concat(frames, UnionArgs::default())?.collect()?;
    let deduped = merged.unique_stable(
        Some(&[STATION_ID_COLUMN.to_string()]),
        UniqueKeepStrategy::First,
        None,
    )?;
    Ok(deduped)
}

/// Writes the merged station table and returns its path.
pub fn write_merged_stations(
    df: &mut DataFrame,
    dir: &Path,
) -> Result<PathBuf, StationMetaError> {
    let path = dir.join(MERGED_STATIONS_FILE);
    let file = File::create(&path).map_err(|e| StationMetaError::CsvWriteIo {
        path: path.clone(),
        source: e,
    })?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .map_err(|e| StationMetaError::CsvWritePolars {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

/// Loads a previously written station checkpoint.
pub fn read_merged_stations(path: &Path) -> Result<DataFrame, StationMetaError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| StationMetaError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .finish()
        .map_err(|e| StationMetaError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })
}

fn meta_files(dir: &Path) -> Result<Vec<PathBuf>, StationMetaError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| StationMetaError::ReadDir(dir.to_path_buf(), e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_meta_snapshot(path: &Path) -> Result<DataFrame, StationMetaError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|options| options.with_separator(b'\t'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| StationMetaError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .finish()
        .map_err(|e| StationMetaError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ID\tFwy\tDir\tDistrict\tLatitude\tLongitude";

    #[test]
    fn deduplicates_on_station_id_keeping_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("d04_text_meta_2017_01_01.txt"),
            format!("{HEADER}\n400001\t101\tN\t4\t37.80\t-122.27\n400002\t880\tS\t4\t37.70\t-122.20\n"),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("d04_text_meta_2017_06_01.txt"),
            format!("{HEADER}\n400001\t101\tN\t4\t37.81\t-122.28\n400003\t580\tE\t4\t37.75\t-122.10\n"),
        )
        .unwrap();

        let df = merge_station_meta(dir.path()).unwrap();
        assert_eq!(df.height(), 3);

        let ids: Vec<&str> = df
            .column(STATION_ID_COLUMN)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec!["400001", "400002", "400003"]);

        // First occurrence wins: latitude stays from the January snapshot.
        let lat: Vec<&str> = df
            .column(STATION_LAT_COLUMN)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(lat[0], "37.80");
    }

    #[test]
    fn checkpoint_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("d04_text_meta_2017_01_01.txt"),
            format!("{HEADER}\n400001\t101\tN\t4\t37.80\t-122.27\n"),
        )
        .unwrap();

        let mut df = merge_station_meta(dir.path()).unwrap();
        let path = write_merged_stations(&mut df, dir.path()).unwrap();
        let reloaded = read_merged_stations(&path).unwrap();
        assert_eq!(reloaded.height(), 1);
        assert_eq!(reloaded.width(), df.width());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            merge_station_meta(dir.path()),
            Err(StationMetaError::NoMetaFiles(_))
        ));
    }
}
