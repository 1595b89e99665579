use std::path::PathBuf;
use thiserror::Error;

use crate::filter::FilterError;
use crate::http::HttpError;

#[derive(Error, Debug)]
pub enum BndError {
    // Version errors
    #[error("{0}")]
    Version(#[from] bnd_version::VersionError),

    // Filter errors
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    // Index errors
    #[error("Failed to parse index document: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid index {location}: {reason}")]
    InvalidIndex { location: String, reason: String },

    #[error("No content provider accepts index {location}")]
    NoContentProvider { location: String },

    #[error("Unknown content provider \"{0}\"")]
    UnknownContentProvider(String),

    // Repository errors
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Repository {name} is read-only")]
    ReadOnly { name: String },

    #[error("Resource has no identity")]
    MissingIdentity,

    // Cache/download errors
    #[error("Failed to download {url} into cache {}: {reason}", cache_file.display())]
    DownloadFailed {
        url: String,
        cache_file: PathBuf,
        reason: String,
    },

    #[error("Local resource not found: {}", .0.display())]
    LocalFileMissing(PathBuf),

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Cache directory required for remote resource {0}")]
    NoCacheDirectory(String),

    // Network errors
    #[error("Network error: {0}")]
    Http(#[from] HttpError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid strategy {strategy} for range \"{range}\"")]
    InvalidStrategy { strategy: String, range: String },
}

pub type Result<T> = std::result::Result<T, BndError>;
