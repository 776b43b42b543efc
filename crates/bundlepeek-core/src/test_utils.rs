//! Test utilities for building archives and profile fixtures.
//!
//! This module provides reusable helpers for creating in-memory test
//! archives and provisioning profile payloads, reducing duplication
//! across format-specific tests.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Paths ending in `/` become
/// directory entries and their content is ignored. Entry names are
/// written verbatim, so hostile names like `../x` survive for
/// path-safety tests.
#[must_use]
pub fn create_test_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;
    use zip::write::ZipWriter;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);

    for (path, data) in entries {
        if path.ends_with('/') {
            zip.add_directory(*path, options).unwrap();
        } else {
            zip.start_file(*path, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

/// Writes a test ZIP archive to `dir/name` and returns its path.
#[must_use]
pub fn write_test_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, create_test_zip(entries)).unwrap();
    path
}

/// A representative ad-hoc provisioning profile payload as XML.
///
/// Carries a name, UUID, team fields, platform, two provisioned
/// devices, creation and expiration dates, and an entitlements
/// dictionary. `ProvisionsAllDevices` is deliberately absent.
#[must_use]
pub fn sample_profile_plist() -> String {
    concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
        "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
        "<plist version=\"1.0\">\n",
        "<dict>\n",
        "  <key>AppIDName</key>\n",
        "  <string>Example App</string>\n",
        "  <key>CreationDate</key>\n",
        "  <date>2025-01-15T09:30:00Z</date>\n",
        "  <key>Entitlements</key>\n",
        "  <dict>\n",
        "    <key>application-identifier</key>\n",
        "    <string>ABCDE12345.com.example.app</string>\n",
        "    <key>get-task-allow</key>\n",
        "    <false/>\n",
        "  </dict>\n",
        "  <key>ExpirationDate</key>\n",
        "  <date>2026-01-15T09:30:00Z</date>\n",
        "  <key>Name</key>\n",
        "  <string>My Ad Hoc Profile</string>\n",
        "  <key>Platform</key>\n",
        "  <array>\n",
        "    <string>iOS</string>\n",
        "  </array>\n",
        "  <key>ProvisionedDevices</key>\n",
        "  <array>\n",
        "    <string>00008030-001234567890802E</string>\n",
        "    <string>00008110-000A5678901BC01E</string>\n",
        "  </array>\n",
        "  <key>TeamIdentifier</key>\n",
        "  <array>\n",
        "    <string>ABCDE12345</string>\n",
        "  </array>\n",
        "  <key>TeamName</key>\n",
        "  <string>Example Team</string>\n",
        "  <key>UUID</key>\n",
        "  <string>f0e1d2c3-0000-1111-2222-333344445555</string>\n",
        "</dict>\n",
        "</plist>\n",
    )
    .to_string()
}

/// Wraps a plist payload in bytes shaped like a CMS signature envelope.
///
/// The prefix imitates DER sequence framing and the suffix imitates a
/// trailing signature blob; neither contains plist markers, so payload
/// scanning must skip both.
#[must_use]
pub fn wrap_in_fake_envelope(payload: &[u8]) -> Vec<u8> {
    let mut signed = vec![
        0x30, 0x82, 0x0b, 0x5d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07,
        0x02, 0xa0, 0x82, 0x0b, 0x4e, 0x30, 0x82, 0x0b, 0x4a, 0x02, 0x01, 0x01,
    ];
    signed.extend_from_slice(payload);
    signed.extend_from_slice(&[0xa0, 0x82, 0x04, 0x00]);
    signed.extend_from_slice(&[0xde; 64]);
    signed
}
