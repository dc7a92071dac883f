use std::path::PathBuf;

use thiserror::Error;

use grantdb_core::StoreError;
use grantdb_text::IndexError;

use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Archive entry '{entry}' escapes the extraction directory")]
    PathTraversal { entry: String },

    #[error("Archive {path} is nested deeper than {max} levels")]
    TooDeep { path: PathBuf, max: usize },

    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Malformed zip archive {path}: {source}")]
    Zip { path: PathBuf, source: zip::result::ZipError },

    #[error("Failed to scan {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Extraction thread panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Document has more than one root element")]
    MultipleRoots,

    #[error("Document ended inside <{0}>")]
    Unterminated(String),

    #[error("Cannot build a patent from an empty record")]
    EmptyRecord,
}

/// Failure of a single ingestion step.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Task deadline passed after {done} file(s)")]
    DeadlineExceeded { done: usize },

    #[error("Blocking worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
