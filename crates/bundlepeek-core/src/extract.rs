//! Per-kind extraction strategies.
//!
//! [`peek`] is the crate's main entry point: classify the container,
//! pick the matching strategy, normalize whatever descriptors the
//! container carries into one [`MetadataRecord`]. Strategies degrade
//! rather than fail when optional pieces are missing; hard errors are
//! reserved for containers that cannot be read at all.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;

use crate::ContainerKind;
use crate::MetadataRecord;
use crate::PeekOptions;
use crate::PreviewError;
use crate::Result;
use crate::archive::ArchiveReader;
use crate::icon::DirIconSource;
use crate::icon::IconSource;
use crate::icon::resolve_icon;
use crate::kind::classify_path;
use crate::plist;
use crate::plist::Value;
use crate::profile;
use crate::record::IconAsset;
use crate::record::expiration_status;

/// Extracts preview metadata from the container at `path`.
///
/// `declared_tag` is the host's untrusted file-type hint; classification
/// falls back to the path's extension when the tag is absent or
/// unknown. Missing optional descriptors leave their record fields
/// absent instead of failing.
///
/// # Errors
///
/// Propagates classification failures, archive and I/O errors, and
/// malformed plists. An app archive without a `.app` directory fails
/// with [`PreviewError::MissingAppBundle`].
pub fn peek(
    path: &Path,
    declared_tag: Option<&str>,
    options: &PeekOptions,
) -> Result<MetadataRecord> {
    let kind = classify_path(path, declared_tag)?;
    let mut record = match kind {
        ContainerKind::AppArchive => peek_app_archive(path, options)?,
        ContainerKind::MobileProvision | ContainerKind::DesktopProvision => {
            peek_profile_file(path, kind)?
        }
        ContainerKind::DeveloperArchive => peek_developer_archive(path)?,
        // Mach-O introspection is out of scope; the kind alone is the
        // preview.
        ContainerKind::DynamicLibrary => MetadataRecord::for_kind(kind),
        _ => peek_bundle_dir(path, kind)?,
    };
    record.expiration_status =
        expiration_status(record.expiration_date, Utc::now(), options.expiry_window_days);
    Ok(record)
}

fn peek_app_archive(path: &Path, options: &PeekOptions) -> Result<MetadataRecord> {
    let mut reader = ArchiveReader::open(path, options)?;
    let app_root = find_app_root(&mut reader)?;
    let mut record = MetadataRecord::for_kind(ContainerKind::AppArchive);

    let info_entry = format!("{app_root}/Info.plist");
    let mut info = None;
    if reader.contains(&info_entry) {
        let decoded = plist::decode(&reader.read_entry(&info_entry)?)?;
        apply_info(&mut record, &decoded);
        info = Some(decoded);
    }

    let profile_entry = format!("{app_root}/embedded.mobileprovision");
    if reader.contains(&profile_entry) {
        let payload = profile::decode_profile(&reader.read_entry(&profile_entry)?)?;
        profile::apply_profile(&mut record, &payload);
    }

    if let Some(info) = info {
        let mut source = ZipIconSource {
            reader: &mut reader,
            app_root: &app_root,
        };
        if let Some(name) = resolve_icon(&info, &mut source) {
            let data = reader.read_entry(&format!("{app_root}/{name}"))?;
            record.icon = Some(IconAsset::Bytes { name, data });
        }
    }
    Ok(record)
}

/// Finds the `.app` directory inside an installable archive.
///
/// Store-style archives nest the app under `Payload/`; ad-hoc zips may
/// place it at the root. `Payload/` wins when both layouts appear.
fn find_app_root(reader: &mut ArchiveReader) -> Result<String> {
    let mut roots = BTreeSet::new();
    for entry in reader.entries()? {
        let mut parts = entry.path.split('/');
        let Some(first) = parts.next() else { continue };
        if first.ends_with(".app") {
            roots.insert(first.to_string());
        } else if first == "Payload" {
            if let Some(second) = parts.next() {
                if second.ends_with(".app") {
                    roots.insert(format!("Payload/{second}"));
                }
            }
        }
    }
    roots
        .iter()
        .find(|root| root.starts_with("Payload/"))
        .or_else(|| roots.iter().next())
        .cloned()
        .ok_or(PreviewError::MissingAppBundle)
}

fn peek_profile_file(path: &Path, kind: ContainerKind) -> Result<MetadataRecord> {
    let payload = profile::decode_profile(&std::fs::read(path)?)?;
    let mut record = MetadataRecord::for_kind(kind);
    profile::apply_profile(&mut record, &payload);
    if let Some(dict) = payload.as_dict() {
        record.raw_top_level_keys = dict.clone();
    }
    Ok(record)
}

fn peek_developer_archive(root: &Path) -> Result<MetadataRecord> {
    let mut record = MetadataRecord::for_kind(ContainerKind::DeveloperArchive);

    let manifest_path = root.join("Info.plist");
    let mut application_path = None;
    if manifest_path.is_file() {
        let manifest = plist::decode(&std::fs::read(&manifest_path)?)?;
        if let Some(dict) = manifest.as_dict() {
            record.raw_top_level_keys = dict.clone();
        }
        set_string(&mut record.display_name, manifest.get_str("Name"));
        if let Some(props) = manifest.get_dict("ApplicationProperties") {
            set_string(
                &mut record.bundle_identifier,
                props.get("CFBundleIdentifier").and_then(Value::as_str),
            );
            set_string(
                &mut record.short_version,
                props
                    .get("CFBundleShortVersionString")
                    .and_then(Value::as_str),
            );
            set_string(
                &mut record.build_version,
                props.get("CFBundleVersion").and_then(Value::as_str),
            );
            application_path = props
                .get("ApplicationPath")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }

    let app_dir = application_path
        .map(|p| root.join("Products").join(p))
        .filter(|p| p.is_dir())
        .or_else(|| first_app_dir(&root.join("Products")));
    if let Some(app_dir) = app_dir {
        fill_from_bundle_dir(&mut record, &app_dir)?;
    }
    Ok(record)
}

fn peek_bundle_dir(path: &Path, kind: ContainerKind) -> Result<MetadataRecord> {
    let mut record = MetadataRecord::for_kind(kind);
    fill_from_bundle_dir(&mut record, path)?;
    Ok(record)
}

/// Reads the descriptor, embedded profile, and icon of a
/// filesystem-backed bundle. A bundle with no `Info.plist` at either
/// conventional location stays a kind-only record.
fn fill_from_bundle_dir(record: &mut MetadataRecord, root: &Path) -> Result<()> {
    let (info_path, resources) = if root.join("Info.plist").is_file() {
        (root.join("Info.plist"), root.to_path_buf())
    } else if root.join("Contents/Info.plist").is_file() {
        (root.join("Contents/Info.plist"), root.join("Contents/Resources"))
    } else {
        return Ok(());
    };

    let info = plist::decode(&std::fs::read(&info_path)?)?;
    apply_info(record, &info);

    for profile_path in [
        root.join("embedded.mobileprovision"),
        root.join("Contents/embedded.provisionprofile"),
    ] {
        if profile_path.is_file() {
            let payload = profile::decode_profile(&std::fs::read(&profile_path)?)?;
            profile::apply_profile(record, &payload);
            break;
        }
    }

    let mut source = DirIconSource::new(&resources);
    if let Some(name) = resolve_icon(&info, &mut source) {
        record.icon = Some(IconAsset::Path(resources.join(name)));
    }
    Ok(())
}

fn first_app_dir(products: &Path) -> Option<PathBuf> {
    let mut apps: Vec<PathBuf> = walkdir::WalkDir::new(products)
        .min_depth(1)
        .max_depth(2)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry.file_type().is_dir()
                && entry.path().extension().is_some_and(|ext| ext == "app")
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    apps.sort();
    apps.into_iter().next()
}

/// Copies the recognized Info.plist fields onto the record; unknown
/// keys remain reachable through `raw_top_level_keys`.
fn apply_info(record: &mut MetadataRecord, info: &Value) {
    if let Some(dict) = info.as_dict() {
        record.raw_top_level_keys = dict.clone();
    }
    set_string(&mut record.bundle_identifier, info.get_str("CFBundleIdentifier"));
    set_string(
        &mut record.display_name,
        info.get_str("CFBundleDisplayName")
            .or_else(|| info.get_str("CFBundleName")),
    );
    set_string(&mut record.short_version, info.get_str("CFBundleShortVersionString"));
    set_string(&mut record.build_version, info.get_str("CFBundleVersion"));
    set_string(
        &mut record.minimum_os_version,
        info.get_str("MinimumOSVersion")
            .or_else(|| info.get_str("LSMinimumSystemVersion")),
    );
    if let Some(families) = info.get_array("UIDeviceFamily") {
        let families: Vec<i64> = families.iter().filter_map(Value::as_i64).collect();
        if !families.is_empty() {
            record.device_family = Some(families);
        }
    }
}

fn set_string(slot: &mut Option<String>, value: Option<&str>) {
    if let Some(value) = value {
        *slot = Some(value.to_string());
    }
}

struct ZipIconSource<'a> {
    reader: &'a mut ArchiveReader,
    app_root: &'a str,
}

impl IconSource for ZipIconSource<'_> {
    fn exists(&mut self, name: &str) -> bool {
        self.reader.contains(&format!("{}/{name}", self.app_root))
    }
}
