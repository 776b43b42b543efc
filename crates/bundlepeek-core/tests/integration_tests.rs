//! End-to-end tests driving the public API against realistic fixtures.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use bundlepeek_core::ArchiveReader;
use bundlepeek_core::ContainerKind;
use bundlepeek_core::ExpirationStatus;
use bundlepeek_core::IconAsset;
use bundlepeek_core::PeekOptions;
use bundlepeek_core::PreviewError;
use bundlepeek_core::peek;
use bundlepeek_core::plist::Value;
use bundlepeek_core::plist::encode_binary;
use bundlepeek_core::test_utils::sample_profile_plist;
use bundlepeek_core::test_utils::wrap_in_fake_envelope;
use bundlepeek_core::test_utils::write_test_zip;
use tempfile::TempDir;

fn binary_info(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut map = BTreeMap::new();
    for (key, value) in fields {
        map.insert((*key).to_string(), Value::String((*value).to_string()));
    }
    encode_binary(&Value::Dict(map))
}

#[test]
fn test_full_ipa_preview() {
    let temp = TempDir::new().unwrap();
    let info = binary_info(&[
        ("CFBundleIdentifier", "com.example.full"),
        ("CFBundleDisplayName", "Full Example"),
        ("CFBundleShortVersionString", "3.1.4"),
        ("CFBundleVersion", "3141"),
        ("CFBundleIconFile", "AppIcon"),
    ]);
    let signed = wrap_in_fake_envelope(sample_profile_plist().as_bytes());
    let path = write_test_zip(
        temp.path(),
        "Full.ipa",
        &[
            ("Payload/", b"".as_slice()),
            ("Payload/Full.app/Info.plist", info.as_slice()),
            (
                "Payload/Full.app/embedded.mobileprovision",
                signed.as_slice(),
            ),
            ("Payload/Full.app/AppIcon@3x.png", b"big-png".as_slice()),
            ("Payload/Full.app/AppIcon.png", b"small-png".as_slice()),
            ("Payload/Full.app/Assets.car", b"car".as_slice()),
        ],
    );

    let record = peek(&path, None, &PeekOptions::default()).unwrap();
    assert_eq!(record.kind, ContainerKind::AppArchive);
    assert_eq!(record.bundle_identifier.as_deref(), Some("com.example.full"));
    assert_eq!(record.title(), Some("Full Example"));
    assert_eq!(record.short_version.as_deref(), Some("3.1.4"));
    assert_eq!(record.build_version.as_deref(), Some("3141"));

    // Profile fields ride along with the app descriptor.
    assert_eq!(record.profile_name.as_deref(), Some("My Ad Hoc Profile"));
    assert_eq!(record.team_name.as_deref(), Some("Example Team"));
    assert!(record.expiration_date.is_some());
    assert_ne!(record.expiration_status, ExpirationStatus::Unknown);
    let entitlements = record.entitlements.unwrap();
    assert_eq!(
        entitlements.get("get-task-allow"),
        Some(&Value::Boolean(false))
    );

    // The bare name matches before any retina suffix is probed.
    assert_eq!(
        record.icon,
        Some(IconAsset::Bytes {
            name: "AppIcon.png".to_string(),
            data: b"small-png".to_vec(),
        })
    );
}

#[test]
fn test_listed_entries_are_readable_at_reported_size() {
    let temp = TempDir::new().unwrap();
    let path = write_test_zip(
        temp.path(),
        "mixed.zip",
        &[
            ("a.txt", b"one".as_slice()),
            ("nested/b.bin", &[0xabu8; 513]),
            ("nested/deeper/c", b"".as_slice()),
        ],
    );

    let mut reader = ArchiveReader::open(&path, &PeekOptions::default()).unwrap();
    for entry in reader.entries().unwrap() {
        if entry.is_dir {
            continue;
        }
        let bytes = reader.read_entry(&entry.path).unwrap();
        assert_eq!(bytes.len() as u64, entry.size, "size mismatch for {}", entry.path);
    }
}

#[test]
fn test_extract_then_preview_directory_bundle() {
    let temp = TempDir::new().unwrap();
    let info = binary_info(&[
        ("CFBundleIdentifier", "com.example.unpacked"),
        ("CFBundleName", "Unpacked"),
    ]);
    let path = write_test_zip(
        temp.path(),
        "bundle.zip",
        &[("Unpacked.app/Info.plist", info.as_slice())],
    );

    let out = TempDir::new().unwrap();
    let mut reader = ArchiveReader::open(&path, &PeekOptions::default()).unwrap();
    let report = reader.extract_all(out.path()).unwrap();
    assert_eq!(report.files_extracted, 1);

    let record = peek(
        &out.path().join("Unpacked.app"),
        None,
        &PeekOptions::default(),
    )
    .unwrap();
    assert_eq!(record.kind, ContainerKind::AppBundle);
    assert_eq!(record.bundle_identifier.as_deref(), Some("com.example.unpacked"));
    assert_eq!(record.display_name.as_deref(), Some("Unpacked"));
}

#[test]
fn test_desktop_profile_is_a_plain_plist() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("mac.provisionprofile");
    std::fs::write(&path, sample_profile_plist()).unwrap();

    let record = peek(&path, None, &PeekOptions::default()).unwrap();
    assert_eq!(record.kind, ContainerKind::DesktopProvision);
    assert_eq!(record.profile_name.as_deref(), Some("My Ad Hoc Profile"));
    assert_eq!(
        record.profile_uuid.as_deref(),
        Some("f0e1d2c3-0000-1111-2222-333344445555")
    );
}

#[test]
fn test_corrupt_archive_surfaces_no_partial_listing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.ipa");
    std::fs::write(&path, b"PK\x03\x04 not actually a central directory").unwrap();

    let result = peek(&path, None, &PeekOptions::default());
    assert!(matches!(result, Err(PreviewError::CorruptArchive(_))));
}

#[test]
fn test_declared_tag_overrides_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("profile.zip");
    std::fs::write(
        &path,
        wrap_in_fake_envelope(sample_profile_plist().as_bytes()),
    )
    .unwrap();

    let record = peek(
        &path,
        Some("com.apple.mobileprovision"),
        &PeekOptions::default(),
    )
    .unwrap();
    assert_eq!(record.kind, ContainerKind::MobileProvision);
    assert_eq!(record.provisioned_device_count, Some(2));
}
