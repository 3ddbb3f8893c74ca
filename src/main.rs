//! CLI entry point for the PeMS clearinghouse downloader.
//!
//! Provides subcommands for the incident accident pipeline, the 5-minute
//! station flow download, and the station metadata layer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use pems::{MonthFilter, Pems};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pems")]
#[command(about = "Download and filter Caltrans PeMS clearinghouse data", long_about = None)]
struct Cli {
    /// PeMS session cookie; falls back to the PEMS_COOKIE environment variable
    #[arg(long, global = true)]
    cookie: Option<String>,

    /// Directory downloads and derived files are written to
    #[arg(long, default_value = "pems-data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch incident archives and produce a district accident GeoJSON
    Accidents {
        /// Target administrative district
        #[arg(short, long)]
        district: u32,

        /// Calendar year to fetch
        #[arg(short, long)]
        year: i32,

        /// Months to fetch (1-12, comma separated); all months when omitted
        #[arg(short, long, value_delimiter = ',')]
        months: Vec<u32>,

        /// Minimum incident duration in minutes
        #[arg(long, default_value_t = 0.0)]
        min_duration: f64,
    },
    /// Fetch 5-minute station flow files for a district
    Flow {
        #[arg(short, long)]
        district: u32,

        #[arg(short, long)]
        year: i32,
    },
    /// Fetch station metadata and produce a station GeoJSON
    Stations {
        #[arg(short, long)]
        district: u32,

        #[arg(short, long)]
        year: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let cli = Cli::parse();
    let cookie = match cli.cookie {
        Some(cookie) => cookie,
        None => std::env::var("PEMS_COOKIE")
            .context("pass --cookie or set the PEMS_COOKIE environment variable")?,
    };

    let pems = Pems::builder()
        .cookie(cookie)
        .data_dir(cli.data_dir)
        .build()
        .await?;

    match cli.command {
        Commands::Accidents {
            district,
            year,
            months,
            min_duration,
        } => {
            let summary = pems
                .collect_accidents()
                .district(district)
                .year(year)
                .maybe_months(month_filter(months)?)
                .min_duration(min_duration)
                .call()
                .await?;
            info!(
                "Wrote {} accident features to {} in {:.1?}",
                summary.accident_features,
                summary.output.display(),
                summary.elapsed
            );
        }
        Commands::Flow { district, year } => {
            let report = pems.fetch_flow().year(year).district(district).call().await?;
            info!(
                "Saved {} flow files ({} failed)",
                report.saved(),
                report.failed()
            );
        }
        Commands::Stations { district, year } => {
            pems.fetch_station_meta()
                .year(year)
                .district(district)
                .call()
                .await?;
            pems.merge_station_meta().await?;
            let features = pems.convert_station_meta().await?;
            info!("Wrote {} station features", features.features.len());
        }
    }

    Ok(())
}

fn month_filter(months: Vec<u32>) -> Result<Option<MonthFilter>> {
    if months.is_empty() {
        Ok(None)
    } else if months.len() == 1 {
        Ok(Some(MonthFilter::single(months[0])?))
    } else {
        Ok(Some(MonthFilter::months(months)?))
    }
}
