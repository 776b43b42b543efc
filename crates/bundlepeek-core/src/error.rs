//! Error types for container inspection operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `PreviewError`.
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Errors that can occur while inspecting a container.
///
/// Structural failures abort the whole extraction and surface to the
/// caller. Missing optional fields (no icon, no expiration date, no
/// entitlements) are never errors; they are `None` in the returned
/// [`MetadataRecord`](crate::MetadataRecord).
#[derive(Error, Debug)]
pub enum PreviewError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive's central directory or container index cannot be parsed.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// A requested entry does not exist in the archive.
    #[error("entry not found in archive: {path}")]
    EntryNotFound {
        /// The slash-separated entry path that was requested.
        path: String,
    },

    /// An archive entry path would escape the extraction directory.
    #[error("unsafe entry path: {path}")]
    UnsafeEntryPath {
        /// The offending entry path.
        path: PathBuf,
    },

    /// A property list could not be decoded.
    #[error("malformed property list: {0}")]
    MalformedPlist(String),

    /// Neither the declared type tag nor the file extension maps to a
    /// known container kind.
    #[error("unsupported container format")]
    UnsupportedFormat,

    /// An installable app archive contains no top-level `.app` directory.
    #[error("no .app bundle found inside archive")]
    MissingAppBundle,
}

impl PreviewError {
    /// Returns `true` if this error means the input itself is damaged,
    /// as opposed to a lookup that simply found nothing.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive(_) | Self::MalformedPlist(_) | Self::UnsafeEntryPath { .. }
        )
    }

    /// Returns a context string for this error, if available.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::CorruptArchive(msg) | Self::MalformedPlist(msg) => Some(msg),
            _ => None,
        }
    }
}
