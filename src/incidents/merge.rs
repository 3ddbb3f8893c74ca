//! Merging extracted daily incident reports into one time-ordered table.

use crate::incidents::error::IncidentDataError;
use crate::incidents::schema::{INCIDENT_COLUMNS, TIMESTAMP_COLUMN, TIMESTAMP_FORMAT};
use log::{info, warn};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File the merged incident table is checkpointed to.
pub const MERGED_REPORTS_FILE: &str = "total_reports.csv";

/// Reads every extracted daily report under `dir` and merges them into a
/// single table sorted ascending by timestamp.
///
/// Daily files are headerless and comma-delimited; a file whose column
/// count deviates from the 19-column schema is fatal. Rows whose timestamp
/// fails to parse are dropped with a warning. No deduplication is performed,
/// so overlapping downloads may yield duplicate rows.
pub fn merge_daily_reports(dir: &Path) -> Result<DataFrame, IncidentDataError> {
    let files = daily_report_files(dir)?;
    if files.is_empty() {
        return Err(IncidentDataError::NoDailyFiles(dir.to_path_buf()));
    }

    let mut frames = Vec::with_capacity(files.len());
    for path in &files {
        frames.push(read_daily_report(path)?.lazy());
        info!("Merged {}", path.display());
    }

    let merged = concat(frames, UnionArgs::default())?
        .with_column(col(TIMESTAMP_COLUMN).str().to_datetime(
            Some(TimeUnit::Milliseconds),
            None,
            StrptimeOptions {
                format: Some(TIMESTAMP_FORMAT.into()),
                strict: false,
                ..Default::default()
            },
            lit("raise"),
        ))
        .collect()?;

    let unparsable = merged.column(TIMESTAMP_COLUMN)?.null_count();
    if unparsable > 0 {
        warn!("Dropping {unparsable} rows with unparsable timestamps");
    }

    let sorted = merged
        .lazy()
        .filter(col(TIMESTAMP_COLUMN).is_not_null())
        .sort([TIMESTAMP_COLUMN], SortMultipleOptions::default())
        .with_column(col(TIMESTAMP_COLUMN).dt().to_string("%Y-%m-%d %H:%M:%S"))
        .collect()?;
    Ok(sorted)
}

/// Writes the merged table next to the daily files it came from and returns
/// its path.
pub fn write_merged(df: &mut DataFrame, dir: &Path) -> Result<PathBuf, IncidentDataError> {
    let path = dir.join(MERGED_REPORTS_FILE);
    let file = File::create(&path).map_err(|e| IncidentDataError::CsvWriteIo {
        path: path.clone(),
        source: e,
    })?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .map_err(|e| IncidentDataError::CsvWritePolars {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

/// Loads a previously written merge checkpoint.
pub fn read_merged(path: &Path) -> Result<DataFrame, IncidentDataError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IncidentDataError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .finish()
        .map_err(|e| IncidentDataError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })
}

fn daily_report_files(dir: &Path) -> Result<Vec<PathBuf>, IncidentDataError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| IncidentDataError::ReadDir(dir.to_path_buf(), e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

// Daily files carry no header row; every column is read as text and only the
// timestamp is parsed, so differently-typed junk in one file cannot poison
// the concatenation.
fn read_daily_report(path: &Path) -> Result<DataFrame, IncidentDataError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IncidentDataError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .finish()
        .map_err(|e| IncidentDataError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    if df.width() != INCIDENT_COLUMNS.len() {
        return Err(IncidentDataError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: INCIDENT_COLUMNS.len(),
            found: df.width(),
        });
    }
    df.set_column_names(INCIDENT_COLUMNS.iter().copied())
        .map_err(|e| IncidentDataError::CsvRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_row(timestamp: &str, description: &str, duration: &str) -> String {
        format!(
            "1016,180101001,{timestamp},{description},I5 N,Sacramento,1,564 3A,38.58,-121.49,3,67,6500,5,N,10.5,510.5,minor,{duration}"
        )
    }

    fn timestamps(df: &DataFrame) -> Vec<String> {
        df.column(TIMESTAMP_COLUMN)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn merges_all_files_sorted_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chp_incidents_day_2018_01_02.txt"),
            format!(
                "{}\n{}\n",
                daily_row("01/02/2018 08:30:00", "1179 - Collision", "20"),
                daily_row("01/02/2018 00:05:00", "1125 - Stalled Vehicle", "5"),
            ),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("chp_incidents_day_2018_01_01.txt"),
            format!("{}\n", daily_row("01/01/2018 23:59:00", "1183 - Hit and Run", "45")),
        )
        .unwrap();

        let df = merge_daily_reports(dir.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), INCIDENT_COLUMNS.len());
        assert_eq!(
            timestamps(&df),
            vec![
                "2018-01-01 23:59:00",
                "2018-01-02 00:05:00",
                "2018-01-02 08:30:00",
            ]
        );
    }

    #[test]
    fn merging_is_idempotent_over_identical_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("day_one.txt"),
            format!(
                "{}\n{}\n",
                daily_row("03/04/2018 12:00:00", "1181 - Collision", "10"),
                daily_row("03/04/2018 06:00:00", "1182 - Collision", "15"),
            ),
        )
        .unwrap();

        let first = merge_daily_reports(dir.path()).unwrap();
        let second = merge_daily_reports(dir.path()).unwrap();
        assert_eq!(first.height(), second.height());
        assert_eq!(timestamps(&first), timestamps(&second));
    }

    #[test]
    fn checkpoint_is_ignored_by_later_merges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("day_one.txt"),
            format!("{}\n", daily_row("05/01/2018 01:00:00", "1179 - Collision", "30")),
        )
        .unwrap();

        let mut df = merge_daily_reports(dir.path()).unwrap();
        let checkpoint = write_merged(&mut df, dir.path()).unwrap();
        assert!(checkpoint.exists());

        let again = merge_daily_reports(dir.path()).unwrap();
        assert_eq!(again.height(), 1);

        let reloaded = read_merged(&checkpoint).unwrap();
        assert_eq!(reloaded.height(), 1);
        assert_eq!(reloaded.width(), INCIDENT_COLUMNS.len());
    }

    #[test]
    fn rows_with_unparsable_timestamps_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("day_one.txt"),
            format!(
                "{}\n{}\n",
                daily_row("01/01/2018 10:00:00", "1179 - Collision", "20"),
                daily_row("never", "1179 - Collision", "20"),
            ),
        )
        .unwrap();

        let df = merge_daily_reports(dir.path()).unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn wrong_column_count_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("day_one.txt"), "a,b,c,d,e\n").unwrap();

        let result = merge_daily_reports(dir.path());
        assert!(matches!(
            result,
            Err(IncidentDataError::SchemaMismatch {
                expected: 19,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            merge_daily_reports(dir.path()),
            Err(IncidentDataError::NoDailyFiles(_))
        ));
    }
}
