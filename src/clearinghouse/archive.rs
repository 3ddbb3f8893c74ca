//! Daily archive extraction and per-item batch reporting.

use crate::clearinghouse::error::ClearinghouseError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zip::ZipArchive;

/// Default token marking zip members that belong to the detector dataset
/// rather than the daily report itself.
pub const DEFAULT_FILTER_TOKEN: &str = "det";

/// What happened to a single catalog URL during a batch download.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Payload extracted and written to `path`.
    Saved { url: String, path: PathBuf },
    /// The archive was readable but held no usable entry; that day's data
    /// is dropped.
    Skipped { url: String, reason: String },
    /// Download or extraction failed after retries.
    Failed {
        url: String,
        error: ClearinghouseError,
    },
}

/// Per-item results of one batch download, in catalog order.
///
/// A failed or skipped day never aborts the batch; callers inspect the
/// outcomes to decide whether the run was good enough.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<FetchOutcome>,
    pub elapsed: Duration,
}

impl FetchReport {
    pub fn saved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Saved { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Failed { .. }))
            .count()
    }
}

/// Pulls the first zip member whose name does not contain `filter_token`,
/// decompresses its gzip content, and writes it into `dest_dir` named after
/// the member minus its `.gz` suffix.
///
/// An archive without such a member yields
/// [`ClearinghouseError::NoMatchingEntry`]; callers decide whether that is a
/// skip or a failure.
pub(crate) fn extract_daily_member(
    zip_path: &Path,
    dest_dir: &Path,
    filter_token: &str,
) -> Result<PathBuf, ClearinghouseError> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ClearinghouseError::ArchiveRead(zip_path.to_path_buf(), e))?;
    let member_name = archive
        .file_names()
        .find(|name| !name.contains(filter_token))
        .map(String::from)
        .ok_or_else(|| ClearinghouseError::NoMatchingEntry {
            archive: zip_path.display().to_string(),
            token: filter_token.to_string(),
        })?;
    let member = archive
        .by_name(&member_name)
        .map_err(|e| ClearinghouseError::ArchiveRead(zip_path.to_path_buf(), e))?;
    let mut decoder = GzDecoder::new(member);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    let out_path = dest_dir.join(strip_gz_suffix(&member_name));
    std::fs::write(&out_path, &decompressed)?;
    Ok(out_path)
}

pub(crate) fn strip_gz_suffix(name: &str) -> &str {
    name.strip_suffix(".gz").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn write_zip(path: &Path, members: &[(&str, Vec<u8>)]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, bytes) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_the_non_filtered_member() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("day.zip");
        let report = b"1016,180101001,01/01/2018 00:12:00,1179 - Collision\n";
        write_zip(
            &zip_path,
            &[
                ("d03_text_det_2018_01_01.txt.gz", gzip_bytes(b"detector data")),
                ("chp_incidents_day_2018_01_01.txt.gz", gzip_bytes(report)),
            ],
        );

        let out = extract_daily_member(&zip_path, dir.path(), "det").unwrap();
        assert_eq!(
            out.file_name().unwrap().to_str().unwrap(),
            "chp_incidents_day_2018_01_01.txt"
        );
        let contents = std::fs::read(&out).unwrap();
        assert_eq!(contents, report);
    }

    #[test]
    fn single_member_archive_yields_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("day.zip");
        let payload = b"a,b,c\n";
        write_zip(
            &zip_path,
            &[("chp_incidents_day_2018_02_01.txt.gz", gzip_bytes(payload))],
        );

        let out = extract_daily_member(&zip_path, dir.path(), "det").unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), payload);
        let extracted: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
            .collect();
        assert_eq!(extracted.len(), 1);
    }

    #[test]
    fn archive_without_usable_member_is_no_matching_entry() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("day.zip");
        write_zip(
            &zip_path,
            &[("d03_text_det_2018_01_01.txt.gz", gzip_bytes(b"detector"))],
        );

        let result = extract_daily_member(&zip_path, dir.path(), "det");
        assert!(matches!(
            result,
            Err(ClearinghouseError::NoMatchingEntry { .. })
        ));
    }

    #[test]
    fn strips_only_the_gz_suffix() {
        assert_eq!(strip_gz_suffix("report.txt.gz"), "report.txt");
        assert_eq!(strip_gz_suffix("report.txt"), "report.txt");
    }
}
