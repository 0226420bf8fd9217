//! Error types for the imgconv library.
//!
//! Two distinct error types reflect the two error surfaces of the client:
//!
//! * [`ValidationError`]: **client-side**. The conversion form rejected the
//!   user's input before anything touched the network. Fully recoverable: the
//!   user edits the form and submits again.
//!
//! * [`ImgConvError`]: **application-level**. Reading an input file, talking
//!   to the conversion service, or writing the results failed. A failure in
//!   the middle of a batch aborts the rest of the batch.
//!
//! Both end up as a single dismissible message string in [`crate::app::App`].

use std::path::PathBuf;
use thiserror::Error;

/// Fallback text shown when an error carries no usable description.
pub const UNKNOWN_ERROR_DETAIL: &str = "Unknown error. Please try again later.";

/// All fatal errors returned by the imgconv library.
#[derive(Debug, Error)]
pub enum ImgConvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A conversion was requested with nothing selected.
    #[error("Please select image files to convert.")]
    EmptySelection,

    /// The conversion form rejected its input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Service errors ────────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, refused, reset…).
    #[error("Request to '{url}' failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    RequestTimeout { url: String, secs: u64 },

    /// The service answered with a non-success status.
    ///
    /// `detail` is the service's human-readable `detail` field when the error
    /// payload had one, otherwise a generic `HTTP <status>` description.
    #[error("Conversion service returned HTTP {status}: {detail}")]
    Service { status: u16, detail: String },

    /// The service answered 2xx but the body was not what the client expects.
    #[error("Unexpected response from '{url}': {reason}")]
    InvalidResponse { url: String, reason: String },

    // ── Local resource errors ─────────────────────────────────────────────
    /// A preview file could not be created.
    #[error("Failed to create preview: {source}")]
    PreviewFailed {
        #[source]
        source: std::io::Error,
    },

    /// Packaging the converted images into a zip archive failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImgConvError {
    /// The text surfaced to the user for this error.
    ///
    /// Service errors report the service's own `detail`; everything else
    /// reports its display string.
    pub fn user_detail(&self) -> String {
        let detail = match self {
            ImgConvError::Service { detail, .. } => detail.clone(),
            other => other.to_string(),
        };
        if detail.trim().is_empty() {
            UNKNOWN_ERROR_DETAIL.to_string()
        } else {
            detail
        }
    }
}

impl From<zip::result::ZipError> for ImgConvError {
    fn from(e: zip::result::ZipError) -> Self {
        ImgConvError::ArchiveFailed(e.to_string())
    }
}

/// A conversion form input was rejected.
///
/// Rules are checked in declaration order and the first failure wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No files are selected.
    #[error("Please select image files to convert.")]
    NoFiles,

    /// Width or height was given but the pair is not two positive integers.
    #[error("Width and height must be valid positive numbers.")]
    InvalidDimensions,

    /// Quality is not an integer in 1–100.
    #[error("Quality must be a number between 1 and 100.")]
    InvalidQuality,

    /// The chosen output format is not offered by the service.
    #[error("Unsupported output format '{format}'. Choose one of: {}", supported.join(", "))]
    UnsupportedFormat {
        format: String,
        supported: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_surfaces_detail_only() {
        let e = ImgConvError::Service {
            status: 400,
            detail: "Unsupported format.".into(),
        };
        assert_eq!(e.user_detail(), "Unsupported format.");
        assert!(e.to_string().contains("400"), "got: {e}");
    }

    #[test]
    fn blank_detail_falls_back_to_unknown() {
        let e = ImgConvError::Service {
            status: 500,
            detail: "  ".into(),
        };
        assert_eq!(e.user_detail(), UNKNOWN_ERROR_DETAIL);
    }

    #[test]
    fn transport_error_uses_display() {
        let e = ImgConvError::RequestFailed {
            url: "http://localhost:8000/convert/".into(),
            reason: "connection refused".into(),
        };
        assert!(e.user_detail().contains("connection refused"));
    }

    #[test]
    fn timeout_display() {
        let e = ImgConvError::RequestTimeout {
            url: "http://svc/convert/".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn validation_is_transparent() {
        let e: ImgConvError = ValidationError::InvalidQuality.into();
        assert_eq!(e.to_string(), "Quality must be a number between 1 and 100.");
    }

    #[test]
    fn unsupported_format_lists_choices() {
        let e = ValidationError::UnsupportedFormat {
            format: "bmp".into(),
            supported: vec!["jpeg".into(), "png".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("bmp") && msg.contains("jpeg, png"), "got: {msg}");
    }
}
