//! Upload error types.

use thiserror::Error;
use yelpcamp_core::UnsupportedImageFormat;

/// Errors that can occur while storing or discarding an asset.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Declared format is not png, jpeg or jpg.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedImageFormat),

    /// Provider credentials are missing.
    #[error("upload provider is not configured")]
    NotConfigured,

    /// The file carried no bytes.
    #[error("uploaded file is empty")]
    EmptyFile,

    /// Provider answered with a non-success status.
    #[error("provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider response could not be understood.
    #[error("parse error: {0}")]
    Parse(String),
}

impl UploadError {
    /// Whether the caller sent something unacceptable (as opposed to a
    /// provider or configuration failure).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_) | Self::EmptyFile)
    }
}
