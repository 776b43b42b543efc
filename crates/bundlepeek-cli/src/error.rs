//! Error conversion utilities for CLI.
//!
//! Converts bundlepeek-core's typed errors (thiserror) into
//! user-friendly contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use bundlepeek_core::PreviewError;
use std::path::Path;

/// Converts `PreviewError` to a user-friendly anyhow error with context
pub fn convert_preview_error(err: PreviewError, container: &Path) -> anyhow::Error {
    match err {
        PreviewError::CorruptArchive(reason) => {
            anyhow!(
                "Corrupt archive '{}': {reason}\n\
                 HINT: The file may be truncated or not a zip-family archive.",
                container.display()
            )
        }
        PreviewError::EntryNotFound { path } => {
            anyhow!(
                "Entry '{path}' not found in '{}'\n\
                 HINT: Use `bundlepeek list` to see the archive's entries.",
                container.display()
            )
        }
        PreviewError::UnsafeEntryPath { path } => {
            anyhow!(
                "Security violation: '{}' contains the unsafe entry path '{}'\n\
                 HINT: This archive may be malicious. Do not unpack from untrusted sources.",
                container.display(),
                path.display()
            )
        }
        PreviewError::MalformedPlist(reason) => {
            anyhow!(
                "Malformed property list in '{}': {reason}\n\
                 HINT: The descriptor may be truncated or damaged.",
                container.display()
            )
        }
        PreviewError::UnsupportedFormat => {
            anyhow!(
                "Cannot determine the container kind of '{}'\n\
                 HINT: Pass --type with an explicit type tag.",
                container.display()
            )
        }
        PreviewError::MissingAppBundle => {
            anyhow!(
                "No .app directory found inside '{}'\n\
                 HINT: An installable archive nests its app under Payload/.",
                container.display()
            )
        }
        PreviewError::Io(io_err) => {
            anyhow!("I/O error while reading '{}': {io_err}", container.display())
        }
    }
}

/// Adds container context to a core result
pub fn add_container_context<T>(
    result: Result<T, PreviewError>,
    container: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_preview_error(e, container))
}
