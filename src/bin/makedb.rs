//! Build the postal code database for Portugal
//!
//! Downloads the GeoNames postal code dump (unless a local copy is given),
//! merges it with the errata file, and writes `code|place|region|x|y` lines.
//!
//! Usage:
//!   cargo run --release --bin makedb -- -o <postalcodes.txt> [OPTIONS]
//!
//! Options:
//!   -e, --errata <PATH>  Errata file overriding GeoNames entries (default: errata.txt)
//!   -i, --input <PATH>   Use a local GeoNames dump instead of downloading
//!   --url <URL>          Archive to download

use anyhow::{Context, Result};
use clap::Parser;
use pt_postcodes::builder::DatabaseBuilder;
use pt_postcodes::download::{self, DEFAULT_SOURCE_URL};
use pt_postcodes::regions::RegionTable;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Postal code database builder
#[derive(Parser, Debug)]
#[command(name = "makedb")]
#[command(about = "Download and convert the GeoNames postal codes database for Portugal")]
struct Args {
    /// Output database path
    #[arg(short, long)]
    output: PathBuf,

    /// Errata file (code|place|lat|lon)
    #[arg(short, long, default_value = "errata.txt")]
    errata: PathBuf,

    /// Local GeoNames dump; skips the download
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// GeoNames archive URL
    #[arg(long, default_value = DEFAULT_SOURCE_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let regions = RegionTable::portugal().context("Invalid region table")?;
    let builder = DatabaseBuilder::new(regions);

    // Keeps the downloaded file alive until the build is done
    let downloaded;
    let bulk_path = match &args.input {
        Some(path) => path.clone(),
        None => {
            info!("Downloading GeoNames' postal codes database for Portugal...");
            downloaded = download::fetch_bulk_source(&args.url)
                .await
                .with_context(|| format!("Failed to fetch {}", args.url))?;
            downloaded.path().to_path_buf()
        }
    };

    info!("Generating the file {:?}...", args.output);
    let (db, report) = builder
        .build_files(&bulk_path, &args.errata)
        .with_context(|| {
            format!(
                "Failed to build database from {:?} and {:?}",
                bulk_path, args.errata
            )
        })?;

    db.write_atomic(&args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    let sources = &report.sources;
    info!("Finished!");
    info!("  Errata codes:          {}", sources.errata_codes);
    info!("  GeoNames codes:        {}", sources.bulk_codes);
    info!("  Without coordinates:   {}", sources.bulk_missing_coordinates);
    info!("  Overridden by errata:  {}", sources.bulk_overridden);
    info!("  Outside all regions:   {}", report.out_of_region);
    info!("  Generalized codes:     {}", report.generalized);
    info!("  Lines written:         {}", report.lines);

    Ok(())
}
