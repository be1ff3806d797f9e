//! Error types for the database build and the test client.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or consuming the postal code database.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid startup configuration (bad tag, rate, region table, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source line could not be parsed. Aborts the whole build.
    #[error("Parse error in {source_name} at line {line}: {message}")]
    Parse {
        source_name: String,
        line: u64,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to fetch the source archive.
    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The downloaded archive is not a readable zip file.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive does not contain {0}")]
    MissingEntry(String),

    /// The finished database could not be moved over the target path.
    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: String,
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn parse(source_name: &str, line: u64, message: impl Into<String>) -> Self {
        Error::Parse {
            source_name: source_name.to_string(),
            line,
            message: message.into(),
        }
    }
}
