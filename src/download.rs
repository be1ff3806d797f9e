//! Fetch and unpack the GeoNames postal code archive.

use reqwest::Client;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// GeoNames postal codes for Portugal
pub const DEFAULT_SOURCE_URL: &str = "http://download.geonames.org/export/zip/PT.zip";

/// Extracted bulk data file. The file and its directory are removed on drop.
#[derive(Debug)]
pub struct BulkSource {
    _dir: TempDir,
    path: PathBuf,
}

impl BulkSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Name of the data file inside an archive: `PT.zip` holds `PT.txt`.
pub fn data_file_name(url: &str) -> String {
    let file_name = url.rsplit('/').next().unwrap_or(url);
    let stem = file_name.split('.').next().unwrap_or(file_name);
    format!("{}.txt", stem)
}

/// Download the archive at `url` and extract its data file.
pub async fn fetch_bulk_source(url: &str) -> Result<BulkSource> {
    fetch_bulk_source_with(&Client::new(), url).await
}

pub async fn fetch_bulk_source_with(client: &Client, url: &str) -> Result<BulkSource> {
    let dir = TempDir::new()?;
    let archive_name = url.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("source.zip");
    let archive_path = dir.path().join(archive_name);

    info!("Downloading {}", url);
    let mut response = client.get(url).send().await?.error_for_status()?;

    let mut bytes = 0usize;
    {
        let file = tokio::fs::File::create(&archive_path).await?;
        let mut out = tokio::io::BufWriter::new(file);
        while let Some(chunk) = response.chunk().await? {
            bytes += chunk.len();
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
    }
    debug!("Downloaded {} bytes to {:?}", bytes, archive_path);

    let entry = data_file_name(url);
    let path = extract_entry(&archive_path, &entry, dir.path())?;
    tokio::fs::remove_file(&archive_path).await?;

    Ok(BulkSource { _dir: dir, path })
}

/// Copy `entry` out of the zip archive at `archive` into `dest_dir`.
pub fn extract_entry(archive: &Path, entry: &str, dest_dir: &Path) -> Result<PathBuf> {
    let mut reader = ZipArchive::new(File::open(archive)?)?;
    let mut file = match reader.by_name(entry) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(Error::MissingEntry(entry.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let dest = dest_dir.join(entry);
    let mut out = BufWriter::new(File::create(&dest)?);
    io::copy(&mut file, &mut out)?;
    out.flush()?;

    debug!("Extracted {} to {:?}", entry, dest);
    Ok(dest)
}
