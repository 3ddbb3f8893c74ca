//! This module provides the main entry point for interacting with the PeMS
//! clearinghouse. It fetches daily dataset archives, merges them into
//! time-ordered tables, and derives district-clipped accident point layers.

use crate::clearinghouse::archive::{
    extract_daily_member, strip_gz_suffix, FetchOutcome, FetchReport, DEFAULT_FILTER_TOKEN,
};
use crate::clearinghouse::catalog::fetch_catalog;
use crate::clearinghouse::client::{
    ClearinghouseClient, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES,
};
use crate::clearinghouse::error::ClearinghouseError;
use crate::error::PemsError;
use crate::geo::clip::{clip_to_district, load_feature_collection};
use crate::geo::convert::{points_from_frame, write_feature_collection};
use crate::incidents::error::IncidentDataError;
use crate::incidents::filter::{select_accidents, with_min_duration};
use crate::incidents::merge::{
    merge_daily_reports, read_merged, write_merged, MERGED_REPORTS_FILE,
};
use crate::incidents::schema::{LAT_COLUMN, LON_COLUMN};
use crate::stations::error::StationMetaError;
use crate::stations::meta::{
    merge_station_meta, read_merged_stations, write_merged_stations, MERGED_STATIONS_FILE,
    STATION_LAT_COLUMN, STATION_LON_COLUMN,
};
use crate::types::dataset::{Dataset, Payload};
use crate::types::month::MonthFilter;
use bon::bon;
use geojson::FeatureCollection;
use log::{info, warn};
use polars::frame::DataFrame;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::task;

/// File the incident point layer is written to.
pub const INCIDENTS_GEOJSON_FILE: &str = "incidents.geojson";
/// File the station point layer is written to.
pub const STATIONS_GEOJSON_FILE: &str = "stations.geojson";
/// File the final filtered accident layer is written to.
pub const ACCIDENTS_GEOJSON_FILE: &str = "accidents.geojson";

/// Figures reported after a full accident-extraction run.
#[derive(Debug)]
pub struct PipelineSummary {
    /// Per-URL outcomes of the download phase.
    pub report: FetchReport,
    /// Rows in the merged incident table.
    pub merged_rows: usize,
    /// Features surviving the district, code and duration filters.
    pub accident_features: usize,
    /// Path of the final GeoJSON layer.
    pub output: PathBuf,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

/// The main client for the PeMS clearinghouse.
///
/// A `Pems` value owns an authenticated HTTP client and a data directory.
/// Each dataset gets its own subdirectory; downloads, merged tables and
/// GeoJSON layers are durable files, so any pipeline stage can be re-run
/// from the previous stage's checkpoint without re-fetching.
///
/// All configuration is passed in at construction; there are no process-wide
/// singletons, and a client is not meant to be shared across tasks.
///
/// # Examples
///
/// ```no_run
/// # use pems::{Pems, PemsError};
/// # async fn run() -> Result<(), PemsError> {
/// let pems = Pems::builder()
///     .cookie("PHPSESSID=...".to_string())
///     .data_dir("./pems-data".into())
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Pems {
    client: ClearinghouseClient,
    data_dir: PathBuf,
}

#[bon]
impl Pems {
    /// Creates a client from a session cookie and a data directory.
    ///
    /// The clearinghouse only serves logged-in sessions, so the cookie is a
    /// required, externally supplied secret. The data directory is created
    /// if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `.cookie(String)`: **Required.** Session cookie value, sent verbatim
    ///   in the `Cookie` header of every request.
    /// * `.data_dir(PathBuf)`: **Required.** Root directory for downloads and
    ///   derived files.
    /// * `.base_url(String)`: Optional. Overrides the clearinghouse endpoint,
    ///   mainly for tests.
    /// * `.max_retries(u32)`: Optional. Retries per request for transient
    ///   failures. Defaults to `5`.
    /// * `.backoff_factor(f64)`: Optional. Seconds multiplied by
    ///   `2^attempt` between retries. Defaults to `1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`ClearinghouseError::InvalidCookie`] for a cookie that cannot
    /// be a header value, and [`PemsError::DataDirCreation`] when the data
    /// directory cannot be created.
    #[builder]
    pub async fn new(
        cookie: String,
        data_dir: PathBuf,
        base_url: Option<String>,
        max_retries: Option<u32>,
        backoff_factor: Option<f64>,
    ) -> Result<Self, PemsError> {
        let client = ClearinghouseClient::new(
            &cookie,
            base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff_factor.unwrap_or(DEFAULT_BACKOFF_FACTOR),
        )?;
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| PemsError::DataDirCreation(data_dir.clone(), e))?;
        Ok(Self { client, data_dir })
    }

    /// Directory a dataset's files are written to.
    pub fn dataset_dir(&self, dataset: Dataset) -> PathBuf {
        self.data_dir.join(dataset.subdir())
    }

    /// Downloads a year of daily incident archives.
    ///
    /// Each archive is unzipped in place: the one member whose name does not
    /// contain the filter token is gunzipped and written as a plain text
    /// file. Days that fail or hold no usable member are recorded in the
    /// returned [`FetchReport`] and never abort the batch.
    ///
    /// # Arguments
    ///
    /// * `.year(i32)`: **Required.** Calendar year of the catalog.
    /// * `.months(MonthFilter)`: Optional. Restricts the catalog months;
    ///   all months when omitted.
    /// * `.filter_token(String)`: Optional. Token marking zip members to
    ///   ignore. Defaults to `"det"`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pems::{MonthFilter, Pems, PemsError};
    /// # async fn run(pems: Pems) -> Result<(), PemsError> {
    /// let report = pems
    ///     .fetch_incidents()
    ///     .year(2018)
    ///     .months(MonthFilter::single(1)?)
    ///     .call()
    ///     .await?;
    /// println!("{} saved, {} skipped", report.saved(), report.skipped());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn fetch_incidents(
        &self,
        year: i32,
        months: Option<MonthFilter>,
        filter_token: Option<String>,
    ) -> Result<FetchReport, PemsError> {
        let months = months.unwrap_or(MonthFilter::All);
        let token = filter_token.unwrap_or_else(|| DEFAULT_FILTER_TOKEN.to_string());
        self.fetch_dataset(Dataset::IncidentsDaily, year, None, &months, &token)
            .await
    }

    /// Downloads a year of 5-minute station flow files for one district.
    #[builder]
    pub async fn fetch_flow(&self, year: i32, district: u32) -> Result<FetchReport, PemsError> {
        self.fetch_dataset(
            Dataset::Flow5Min,
            year,
            Some(district),
            &MonthFilter::All,
            DEFAULT_FILTER_TOKEN,
        )
        .await
    }

    /// Downloads a year of station metadata snapshots for one district.
    #[builder]
    pub async fn fetch_station_meta(
        &self,
        year: i32,
        district: u32,
    ) -> Result<FetchReport, PemsError> {
        self.fetch_dataset(
            Dataset::StationMeta,
            year,
            Some(district),
            &MonthFilter::All,
            DEFAULT_FILTER_TOKEN,
        )
        .await
    }

    /// Merges the extracted daily incident reports into one table sorted by
    /// timestamp and checkpoints it as `total_reports.csv`.
    pub async fn merge_incidents(&self) -> Result<DataFrame, PemsError> {
        let dir = self.dataset_dir(Dataset::IncidentsDaily);
        let df = task::spawn_blocking(move || {
            let mut df = merge_daily_reports(&dir)?;
            let path = write_merged(&mut df, &dir)?;
            info!("Merged incident table written to {}", path.display());
            Ok::<DataFrame, IncidentDataError>(df)
        })
        .await
        .map_err(IncidentDataError::from)??;
        Ok(df)
    }

    /// Converts the merged incident table into an EPSG:4326 point layer and
    /// writes it as `incidents.geojson`.
    pub async fn convert_incidents(&self) -> Result<FeatureCollection, PemsError> {
        let dir = self.dataset_dir(Dataset::IncidentsDaily);
        let features = task::spawn_blocking(move || {
            let merged = read_merged(&dir.join(MERGED_REPORTS_FILE))?;
            let features = points_from_frame(&merged, LON_COLUMN, LAT_COLUMN)?;
            let path = dir.join(INCIDENTS_GEOJSON_FILE);
            write_feature_collection(&features, &path)?;
            info!(
                "Wrote {} point features to {}",
                features.features.len(),
                path.display()
            );
            Ok::<FeatureCollection, PemsError>(features)
        })
        .await
        .map_err(|e| PemsError::from(IncidentDataError::from(e)))??;
        Ok(features)
    }

    /// Merges the station metadata snapshots, deduplicated on station ID,
    /// and checkpoints them as `total_stations.csv`.
    pub async fn merge_station_meta(&self) -> Result<DataFrame, PemsError> {
        let dir = self.dataset_dir(Dataset::StationMeta);
        let df = task::spawn_blocking(move || {
            let mut df = merge_station_meta(&dir)?;
            let path = write_merged_stations(&mut df, &dir)?;
            info!("Merged station table written to {}", path.display());
            Ok::<DataFrame, StationMetaError>(df)
        })
        .await
        .map_err(StationMetaError::from)??;
        Ok(df)
    }

    /// Converts the merged station table into a point layer and writes it as
    /// `stations.geojson`.
    pub async fn convert_station_meta(&self) -> Result<FeatureCollection, PemsError> {
        let dir = self.dataset_dir(Dataset::StationMeta);
        let features = task::spawn_blocking(move || {
            let merged = read_merged_stations(&dir.join(MERGED_STATIONS_FILE))?;
            let features = points_from_frame(&merged, STATION_LON_COLUMN, STATION_LAT_COLUMN)?;
            let path = dir.join(STATIONS_GEOJSON_FILE);
            write_feature_collection(&features, &path)?;
            info!(
                "Wrote {} station features to {}",
                features.features.len(),
                path.display()
            );
            Ok::<FeatureCollection, PemsError>(features)
        })
        .await
        .map_err(|e| PemsError::from(StationMetaError::from(e)))??;
        Ok(features)
    }

    /// Runs the whole incident pipeline: fetch, merge, geo-convert, clip to
    /// a district, keep collision codes, apply the duration floor, and write
    /// the resulting layer as `accidents.geojson`.
    ///
    /// # Arguments
    ///
    /// * `.district(u32)`: **Required.** Target administrative district.
    /// * `.year(i32)`: **Required.** Calendar year of the catalog.
    /// * `.months(MonthFilter)`: Optional. Restricts the fetched months.
    /// * `.min_duration(f64)`: Optional. Minimum incident duration in
    ///   minutes; missing durations count as zero. Defaults to `0.0`.
    /// * `.filter_token(String)`: Optional. Zip member token to ignore.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pems::{MonthFilter, Pems, PemsError};
    /// # async fn run(pems: Pems) -> Result<(), PemsError> {
    /// let summary = pems
    ///     .collect_accidents()
    ///     .district(4)
    ///     .year(2018)
    ///     .months(MonthFilter::single(1)?)
    ///     .min_duration(15.0)
    ///     .call()
    ///     .await?;
    /// println!(
    ///     "{} accidents -> {}",
    ///     summary.accident_features,
    ///     summary.output.display()
    /// );
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn collect_accidents(
        &self,
        district: u32,
        year: i32,
        months: Option<MonthFilter>,
        min_duration: Option<f64>,
        filter_token: Option<String>,
    ) -> Result<PipelineSummary, PemsError> {
        let started = Instant::now();
        let months = months.unwrap_or(MonthFilter::All);
        let token = filter_token.unwrap_or_else(|| DEFAULT_FILTER_TOKEN.to_string());

        let report = self
            .fetch_dataset(Dataset::IncidentsDaily, year, None, &months, &token)
            .await?;
        let merged = self.merge_incidents().await?;
        self.convert_incidents().await?;

        // Clip from the on-disk layer so the spatial stages can be re-run
        // without re-fetching.
        let incidents_path = self
            .dataset_dir(Dataset::IncidentsDaily)
            .join(INCIDENTS_GEOJSON_FILE);
        let features = load_feature_collection(&incidents_path)?;
        let clipped = clip_to_district(&features, district);
        info!(
            "{} of {} features fall in district {district}",
            clipped.features.len(),
            features.features.len()
        );
        let accidents = select_accidents(&clipped);
        let limited = with_min_duration(&accidents, min_duration.unwrap_or(0.0));

        let output = self
            .dataset_dir(Dataset::IncidentsDaily)
            .join(ACCIDENTS_GEOJSON_FILE);
        write_feature_collection(&limited, &output)?;

        let summary = PipelineSummary {
            merged_rows: merged.height(),
            accident_features: limited.features.len(),
            report,
            output,
            elapsed: started.elapsed(),
        };
        info!(
            "Kept {} accident features; wrote {} in {:.1?}",
            summary.accident_features,
            summary.output.display(),
            summary.elapsed
        );
        Ok(summary)
    }

    /// Fetches every daily file a catalog lists, sequentially and in
    /// catalog order.
    async fn fetch_dataset(
        &self,
        dataset: Dataset,
        year: i32,
        district_id: Option<u32>,
        months: &MonthFilter,
        filter_token: &str,
    ) -> Result<FetchReport, PemsError> {
        let started = Instant::now();
        let catalog = fetch_catalog(&self.client, dataset, year, district_id).await?;
        let urls = catalog.daily_urls(months);
        info!("Catalog for {dataset} {year} lists {} daily files", urls.len());

        let dest_dir = self.dataset_dir(dataset);
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| PemsError::DataDirCreation(dest_dir.clone(), e))?;

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            info!("Downloading {url}");
            let outcome = self.fetch_one(dataset, &url, &dest_dir, filter_token).await;
            match &outcome {
                FetchOutcome::Skipped { url, reason } => warn!("Skipping {url}: {reason}"),
                FetchOutcome::Failed { url, error } => warn!("Failed to fetch {url}: {error}"),
                FetchOutcome::Saved { .. } => {}
            }
            outcomes.push(outcome);
        }

        let report = FetchReport {
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            "Fetched {} files for {dataset} {year} in {:.1?} ({} skipped, {} failed)",
            report.saved(),
            report.elapsed,
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    async fn fetch_one(
        &self,
        dataset: Dataset,
        url: &str,
        dest_dir: &Path,
        filter_token: &str,
    ) -> FetchOutcome {
        match self.fetch_one_inner(dataset, url, dest_dir, filter_token).await {
            Ok(path) => FetchOutcome::Saved {
                url: url.to_string(),
                path,
            },
            Err(ClearinghouseError::NoMatchingEntry { archive, token }) => FetchOutcome::Skipped {
                url: url.to_string(),
                reason: format!("archive {archive} has no member without token '{token}'"),
            },
            Err(error) => FetchOutcome::Failed {
                url: url.to_string(),
                error,
            },
        }
    }

    async fn fetch_one_inner(
        &self,
        dataset: Dataset,
        url: &str,
        dest_dir: &Path,
        filter_token: &str,
    ) -> Result<PathBuf, ClearinghouseError> {
        match dataset.payload() {
            Payload::ZippedGzip => {
                let (bytes, _) = self.client.download_named(url).await?;
                let dest = dest_dir.to_path_buf();
                let token = filter_token.to_string();
                task::spawn_blocking(move || {
                    // The temp zip is removed on drop, error paths included.
                    let mut temp_zip = NamedTempFile::new_in(&dest)?;
                    temp_zip.write_all(&bytes)?;
                    temp_zip.flush()?;
                    extract_daily_member(temp_zip.path(), &dest, &token)
                })
                .await?
            }
            Payload::Gzip => {
                let (bytes, filename) = self.client.download_gzip_decompressed(url).await?;
                let filename = filename
                    .ok_or_else(|| ClearinghouseError::MissingContentDisposition(url.to_string()))?;
                let path = dest_dir.join(strip_gz_suffix(&filename));
                tokio::fs::write(&path, &bytes).await?;
                Ok(path)
            }
            Payload::Plain => {
                let (bytes, filename) = self.client.download_named(url).await?;
                let filename = filename
                    .ok_or_else(|| ClearinghouseError::MissingContentDisposition(url.to_string()))?;
                let path = dest_dir.join(&filename);
                tokio::fs::write(&path, &bytes).await?;
                Ok(path)
            }
        }
    }
}
