//! Container kind classification.
//!
//! The host environment hands us a declared type tag (a UTI string) and a
//! file path. The tag is an untrusted hint: many real files carry no
//! reliable tag at all, so the file extension serves as a fallback and an
//! unrecognized-but-present input degrades to [`ContainerKind::GenericBundle`]
//! rather than failing.

use std::path::Path;

use crate::PreviewError;
use crate::Result;

/// The kind of container selected for one extraction.
///
/// Exactly one kind is chosen per call; the metadata extractor dispatches
/// exhaustively over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Zipped installable app archive (`.ipa`, `.tipa`).
    AppArchive,
    /// Unzipped `.app` bundle directory.
    AppBundle,
    /// `.framework` bundle directory.
    Framework,
    /// Mach-O dynamic library.
    DynamicLibrary,
    /// iOS provisioning profile, new or legacy serialization.
    MobileProvision,
    /// macOS provisioning profile (plain plist serialization).
    DesktopProvision,
    /// Xcode `.xcarchive` directory.
    DeveloperArchive,
    /// App or system extension bundle (`.appex`).
    AppExtension,
    /// Spotlight metadata importer bundle.
    MetadataImporter,
    /// CoreSimulator device type descriptor bundle.
    SimulatorDevice,
    /// XPC service bundle.
    XpcService,
    /// Generic plugin bundle.
    Plugin,
    /// Xcode IDE / DVT plugin bundle.
    IdePlugin,
    /// Any other bundle-shaped directory.
    GenericBundle,
    /// A bare directory with no other match.
    Directory,
}

impl ContainerKind {
    /// All kinds, in declaration order. Used by the CLI and by the
    /// classifier totality test.
    pub const ALL: [Self; 15] = [
        Self::AppArchive,
        Self::AppBundle,
        Self::Framework,
        Self::DynamicLibrary,
        Self::MobileProvision,
        Self::DesktopProvision,
        Self::DeveloperArchive,
        Self::AppExtension,
        Self::MetadataImporter,
        Self::SimulatorDevice,
        Self::XpcService,
        Self::Plugin,
        Self::IdePlugin,
        Self::GenericBundle,
        Self::Directory,
    ];

    /// Stable lowercase name, used in CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AppArchive => "app-archive",
            Self::AppBundle => "app-bundle",
            Self::Framework => "framework",
            Self::DynamicLibrary => "dylib",
            Self::MobileProvision => "mobileprovision",
            Self::DesktopProvision => "provisionprofile",
            Self::DeveloperArchive => "xcarchive",
            Self::AppExtension => "app-extension",
            Self::MetadataImporter => "metadata-importer",
            Self::SimulatorDevice => "simulator-device",
            Self::XpcService => "xpc-service",
            Self::Plugin => "plugin",
            Self::IdePlugin => "ide-plugin",
            Self::GenericBundle => "generic-bundle",
            Self::Directory => "directory",
        }
    }

    /// Returns `true` for kinds whose descriptor lives in a directory on
    /// disk rather than inside a zip or a signed blob.
    #[must_use]
    pub const fn is_directory_backed(self) -> bool {
        !matches!(
            self,
            Self::AppArchive
                | Self::MobileProvision
                | Self::DesktopProvision
                | Self::DynamicLibrary
        )
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a declared UTI tag to a container kind.
///
/// The tag set mirrors the UTIs Launch Services reports for these file
/// types, plus the third-party TrollStore ipa tags.
#[must_use]
fn kind_for_tag(tag: &str) -> Option<ContainerKind> {
    match tag {
        "com.apple.itunes.ipa"
        | "com.opa334.trollstore.tipa"
        | "dyn.ah62d4rv4ge81k4puqe" => Some(ContainerKind::AppArchive),
        "com.apple.application-bundle" | "com.apple.application-file" => {
            Some(ContainerKind::AppBundle)
        }
        "com.apple.framework" => Some(ContainerKind::Framework),
        "com.apple.mach-o-dylib" => Some(ContainerKind::DynamicLibrary),
        "com.apple.mobileprovision" | "com.apple.iphone.mobileprovision" => {
            Some(ContainerKind::MobileProvision)
        }
        "com.apple.provisionprofile" => Some(ContainerKind::DesktopProvision),
        "com.apple.xcode.archive" => Some(ContainerKind::DeveloperArchive),
        "com.apple.application-and-system-extension" => Some(ContainerKind::AppExtension),
        "com.apple.metadata-importer" => Some(ContainerKind::MetadataImporter),
        "com.apple.coresimulator.simdevicetype" => Some(ContainerKind::SimulatorDevice),
        "com.apple.xpc-service" => Some(ContainerKind::XpcService),
        "com.apple.plugin" => Some(ContainerKind::Plugin),
        "com.apple.dt.ide.plug-in" | "com.apple.dt.dvt.plug-in" => Some(ContainerKind::IdePlugin),
        "com.apple.generic-bundle" => Some(ContainerKind::GenericBundle),
        "public.folder" => Some(ContainerKind::Directory),
        _ => None,
    }
}

/// Maps a lowercase file extension to a container kind.
#[must_use]
fn kind_for_extension(ext: &str) -> Option<ContainerKind> {
    match ext {
        "ipa" | "tipa" => Some(ContainerKind::AppArchive),
        "app" => Some(ContainerKind::AppBundle),
        "framework" => Some(ContainerKind::Framework),
        "dylib" => Some(ContainerKind::DynamicLibrary),
        "mobileprovision" => Some(ContainerKind::MobileProvision),
        "provisionprofile" => Some(ContainerKind::DesktopProvision),
        "xcarchive" => Some(ContainerKind::DeveloperArchive),
        "appex" | "systemextension" => Some(ContainerKind::AppExtension),
        "mdimporter" => Some(ContainerKind::MetadataImporter),
        "simdevicetype" => Some(ContainerKind::SimulatorDevice),
        "xpc" => Some(ContainerKind::XpcService),
        "plugin" => Some(ContainerKind::Plugin),
        "ideplugin" | "dvtplugin" => Some(ContainerKind::IdePlugin),
        "bundle" => Some(ContainerKind::GenericBundle),
        _ => None,
    }
}

/// Decides which extraction strategy applies to a container.
///
/// The declared tag is checked first; the extension is a fallback for
/// hosts that pass only a path. When either input is present but matches
/// nothing, the result is a best-effort [`ContainerKind::GenericBundle`].
///
/// # Errors
///
/// Returns [`PreviewError::UnsupportedFormat`] only when neither a tag
/// nor an extension is available at all.
pub fn classify(declared_tag: Option<&str>, extension: Option<&str>) -> Result<ContainerKind> {
    let tag = declared_tag.filter(|t| !t.is_empty());
    let ext = extension.filter(|e| !e.is_empty()).map(str::to_ascii_lowercase);

    if let Some(kind) = tag.and_then(kind_for_tag) {
        return Ok(kind);
    }
    if let Some(kind) = ext.as_deref().and_then(kind_for_extension) {
        return Ok(kind);
    }
    if tag.is_some() || ext.is_some() {
        return Ok(ContainerKind::GenericBundle);
    }
    Err(PreviewError::UnsupportedFormat)
}

/// Convenience wrapper around [`classify`] that pulls the extension from
/// a filesystem path.
pub fn classify_path(path: &Path, declared_tag: Option<&str>) -> Result<ContainerKind> {
    let ext = path.extension().and_then(|e| e.to_str());
    match classify(declared_tag, ext) {
        // A tagless, extensionless path can still be previewed as a bare
        // directory.
        Err(PreviewError::UnsupportedFormat) if path.is_dir() => Ok(ContainerKind::Directory),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ipa_tags() {
        for tag in [
            "com.apple.itunes.ipa",
            "com.opa334.trollstore.tipa",
            "dyn.ah62d4rv4ge81k4puqe",
        ] {
            assert_eq!(classify(Some(tag), None).unwrap(), ContainerKind::AppArchive);
        }
    }

    #[test]
    fn test_classify_tag_wins_over_extension() {
        let kind = classify(Some("com.apple.mobileprovision"), Some("zip")).unwrap();
        assert_eq!(kind, ContainerKind::MobileProvision);
    }

    #[test]
    fn test_classify_extension_fallback() {
        assert_eq!(classify(None, Some("ipa")).unwrap(), ContainerKind::AppArchive);
        assert_eq!(classify(None, Some("IPA")).unwrap(), ContainerKind::AppArchive);
        assert_eq!(
            classify(None, Some("xcarchive")).unwrap(),
            ContainerKind::DeveloperArchive
        );
        assert_eq!(
            classify(None, Some("provisionprofile")).unwrap(),
            ContainerKind::DesktopProvision
        );
    }

    #[test]
    fn test_classify_unknown_falls_back_to_generic_bundle() {
        assert_eq!(
            classify(Some("org.example.mystery"), None).unwrap(),
            ContainerKind::GenericBundle
        );
        assert_eq!(
            classify(None, Some("qlgenerator")).unwrap(),
            ContainerKind::GenericBundle
        );
    }

    #[test]
    fn test_classify_nothing_to_go_on() {
        assert!(matches!(
            classify(None, None),
            Err(PreviewError::UnsupportedFormat)
        ));
        assert!(matches!(
            classify(Some(""), Some("")),
            Err(PreviewError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_classify_total_over_kind_enum() {
        // Every kind must be reachable from at least one tag or extension.
        let inputs: Vec<(Option<&str>, Option<&str>)> = vec![
            (Some("com.apple.itunes.ipa"), None),
            (Some("com.apple.application-bundle"), None),
            (Some("com.apple.framework"), None),
            (Some("com.apple.mach-o-dylib"), None),
            (Some("com.apple.iphone.mobileprovision"), None),
            (Some("com.apple.provisionprofile"), None),
            (Some("com.apple.xcode.archive"), None),
            (Some("com.apple.application-and-system-extension"), None),
            (Some("com.apple.metadata-importer"), None),
            (Some("com.apple.coresimulator.simdevicetype"), None),
            (Some("com.apple.xpc-service"), None),
            (Some("com.apple.plugin"), None),
            (Some("com.apple.dt.dvt.plug-in"), None),
            (Some("com.apple.generic-bundle"), None),
            (Some("public.folder"), None),
        ];

        let mut produced: Vec<ContainerKind> = inputs
            .into_iter()
            .map(|(tag, ext)| classify(tag, ext).unwrap())
            .collect();
        produced.sort_by_key(|k| k.name());
        produced.dedup();
        assert_eq!(produced.len(), ContainerKind::ALL.len());
    }

    #[test]
    fn test_classify_path_extension() {
        let kind = classify_path(Path::new("MyApp.ipa"), None).unwrap();
        assert_eq!(kind, ContainerKind::AppArchive);
    }

    #[test]
    fn test_classify_path_bare_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let kind = classify_path(temp.path(), None).unwrap();
        assert_eq!(kind, ContainerKind::Directory);
    }

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<&str> = ContainerKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ContainerKind::ALL.len());
    }

    #[test]
    fn test_directory_backed() {
        assert!(!ContainerKind::AppArchive.is_directory_backed());
        assert!(!ContainerKind::MobileProvision.is_directory_backed());
        assert!(ContainerKind::AppBundle.is_directory_backed());
        assert!(ContainerKind::DeveloperArchive.is_directory_backed());
    }
}
