//! Preview metadata extraction for app archives, bundles, and
//! provisioning profiles.
//!
//! `bundlepeek-core` reads just enough of a container (an `.ipa`, an
//! on-disk bundle, a provisioning profile, an `.xcarchive`) to render a
//! preview: identifier, name, versions, icon, and profile expiration.
//! Extraction is a pure read; nothing is cached and nothing is written
//! except through the explicit [`ArchiveReader::extract_all`] call.
//!
//! # Examples
//!
//! ```no_run
//! use bundlepeek_core::PeekOptions;
//! use bundlepeek_core::peek;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let record = peek("MyApp.ipa".as_ref(), None, &PeekOptions::default())?;
//! println!("{} ({})", record.title().unwrap_or("untitled"), record.kind);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod icon;
pub mod kind;
pub mod plist;
pub mod profile;
pub mod record;
pub mod test_utils;

// Re-export main API types
pub use archive::ArchiveEntry;
pub use archive::ArchiveReader;
pub use archive::ExtractionReport;
pub use config::PeekOptions;
pub use error::PreviewError;
pub use error::Result;
pub use extract::peek;
pub use kind::ContainerKind;
pub use kind::classify;
pub use record::ExpirationStatus;
pub use record::IconAsset;
pub use record::MetadataRecord;
