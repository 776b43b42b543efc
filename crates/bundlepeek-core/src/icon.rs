//! Best-resolution icon lookup across legacy and modern conventions.
//!
//! Icon declarations moved twice over the years: a single
//! `CFBundleIconFile` string, then a `CFBundleIconFiles` array, then the
//! nested `CFBundleIcons` dictionary. Files are named with numeric size
//! suffixes, so the lexicographically-last name approximates the highest
//! resolution. Resolution never fails hard: no icon is a soft absence
//! and the caller substitutes a placeholder.

use std::path::Path;

use crate::plist::Value;

/// Probe-only view of a bundle's files, so one resolution algorithm
/// serves both on-disk bundles and app directories inside an archive.
pub trait IconSource {
    /// Returns whether `name`, relative to the bundle root, exists as a
    /// file.
    fn exists(&mut self, name: &str) -> bool;
}

/// Icon source over a bundle directory on disk.
pub struct DirIconSource<'a> {
    root: &'a Path,
}

impl<'a> DirIconSource<'a> {
    /// Creates a source rooted at a bundle directory.
    #[must_use]
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }
}

impl IconSource for DirIconSource<'_> {
    fn exists(&mut self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// Finds the best icon declared by an Info.plist, returning its name
/// relative to the bundle root, or `None` when nothing resolves.
///
/// Candidates are taken from the modern `CFBundleIcons` dictionary
/// first, then the legacy `CFBundleIconFiles` array, then the legacy
/// `CFBundleIconFile` string; within a list, larger numeric suffixes are
/// preferred. Each candidate is probed with the `""`, `@2x`, and `@3x`
/// suffixes and the `.png` extension; the first existing file wins.
pub fn resolve_icon(info: &Value, source: &mut dyn IconSource) -> Option<String> {
    for candidate in icon_candidates(info) {
        if let Some(found) = probe(&candidate, source) {
            return Some(found);
        }
    }
    None
}

/// Declared icon names in preference order, best first.
fn icon_candidates(info: &Value) -> Vec<String> {
    let modern = info
        .get("CFBundleIcons")
        .and_then(|icons| icons.get("CFBundlePrimaryIcon"))
        .and_then(|primary| primary.get_array("CFBundleIconFiles"));
    let legacy = info.get_array("CFBundleIconFiles");

    if let Some(files) = modern.or(legacy) {
        let mut names: Vec<String> = files
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        names.sort_unstable();
        names.reverse();
        return names;
    }
    info.get_str("CFBundleIconFile")
        .map(str::to_string)
        .into_iter()
        .collect()
}

fn probe(candidate: &str, source: &mut dyn IconSource) -> Option<String> {
    let base = candidate.strip_suffix(".png").unwrap_or(candidate);
    for suffix in ["", "@2x", "@3x"] {
        let name = format!("{base}{suffix}.png");
        if source.exists(&name) {
            return Some(name);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn info_with_legacy_files(names: &[&str]) -> Value {
        let mut map = BTreeMap::new();
        map.insert(
            "CFBundleIconFiles".to_string(),
            Value::Array(names.iter().map(|n| Value::String((*n).into())).collect()),
        );
        Value::Dict(map)
    }

    fn info_with_modern_files(names: &[&str]) -> Value {
        let mut primary = BTreeMap::new();
        primary.insert(
            "CFBundleIconFiles".to_string(),
            Value::Array(names.iter().map(|n| Value::String((*n).into())).collect()),
        );
        let mut icons = BTreeMap::new();
        icons.insert(
            "CFBundlePrimaryIcon".to_string(),
            Value::Dict(primary),
        );
        let mut map = BTreeMap::new();
        map.insert("CFBundleIcons".to_string(), Value::Dict(icons));
        Value::Dict(map)
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"png").unwrap();
    }

    #[test]
    fn test_legacy_array_prefers_lexicographically_last() {
        let temp = TempDir::new().unwrap();
        touch(&temp, "Icon-40.png");
        touch(&temp, "Icon-60.png");
        touch(&temp, "Icon-72.png");

        let info = info_with_legacy_files(&["Icon-40", "Icon-60", "Icon-72"]);
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), Some("Icon-72.png".into()));
    }

    #[test]
    fn test_legacy_array_fallback_chain() {
        let info = info_with_legacy_files(&["Icon-40", "Icon-60", "Icon-72"]);

        let temp = TempDir::new().unwrap();
        touch(&temp, "Icon-40.png");
        touch(&temp, "Icon-60.png");
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), Some("Icon-60.png".into()));

        let temp = TempDir::new().unwrap();
        touch(&temp, "Icon-40.png");
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), Some("Icon-40.png".into()));

        let temp = TempDir::new().unwrap();
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), None);
    }

    #[test]
    fn test_modern_wins_over_legacy() {
        let temp = TempDir::new().unwrap();
        touch(&temp, "AppIcon60x60.png");
        touch(&temp, "Old-Icon.png");

        let mut map = info_with_modern_files(&["AppIcon60x60"])
            .as_dict()
            .unwrap()
            .clone();
        map.insert(
            "CFBundleIconFiles".to_string(),
            Value::Array(vec![Value::String("Old-Icon".into())]),
        );
        let info = Value::Dict(map);

        let mut source = DirIconSource::new(temp.path());
        assert_eq!(
            resolve_icon(&info, &mut source),
            Some("AppIcon60x60.png".into())
        );
    }

    #[test]
    fn test_retina_suffix_probing() {
        let temp = TempDir::new().unwrap();
        touch(&temp, "AppIcon60x60@2x.png");

        let info = info_with_modern_files(&["AppIcon60x60"]);
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(
            resolve_icon(&info, &mut source),
            Some("AppIcon60x60@2x.png".into())
        );
    }

    #[test]
    fn test_single_legacy_icon_file() {
        let temp = TempDir::new().unwrap();
        touch(&temp, "Icon.png");

        let mut map = BTreeMap::new();
        map.insert("CFBundleIconFile".to_string(), Value::String("Icon".into()));
        let info = Value::Dict(map);

        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), Some("Icon.png".into()));
    }

    #[test]
    fn test_candidate_with_png_extension_already() {
        let temp = TempDir::new().unwrap();
        touch(&temp, "Icon.png");

        let mut map = BTreeMap::new();
        map.insert(
            "CFBundleIconFile".to_string(),
            Value::String("Icon.png".into()),
        );
        let info = Value::Dict(map);

        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), Some("Icon.png".into()));
    }

    #[test]
    fn test_no_declarations_is_soft_absence() {
        let temp = TempDir::new().unwrap();
        let info = Value::Dict(BTreeMap::new());
        let mut source = DirIconSource::new(temp.path());
        assert_eq!(resolve_icon(&info, &mut source), None);
    }
}
