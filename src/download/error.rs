use std::path::PathBuf;

use thiserror::Error;

use crate::api::PostId;

/// Per-post download outcomes other than success.
///
/// `AlreadyExists` is not a failure: the batch counts it as skipped. Every
/// other variant is recorded on the post's row and the batch moves on.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Video URL not found for post {0}")]
    MediaMissing(PostId),

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("HTTP error {status} downloading {path}")]
    HttpStatus { status: u16, path: String },

    #[error("HTTP error downloading {path}: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
        path: String,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether another attempt at the same URL could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Http { .. } => true,
            DownloadError::MediaMissing(_)
            | DownloadError::AlreadyExists(_)
            | DownloadError::Disk(_) => false,
        }
    }
}
