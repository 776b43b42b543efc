//! Random access into zip-family app archives.
//!
//! Archives can run to hundreds of megabytes while a preview only ever
//! needs one or two entries (the descriptor plist, an icon), so reads go
//! through the container's central directory instead of unpacking
//! everything. Full extraction exists only for the directory-walk
//! fallback paths and validates every entry path before the first write.

use std::fs::File;
use std::io::Read;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use zip::result::ZipError;

use crate::PeekOptions;
use crate::PreviewError;
use crate::Result;

/// One entry in an archive snapshot.
///
/// Paths are slash-separated, relative to the archive root, and unique
/// within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated path relative to the archive root.
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Whether the entry is a directory marker.
    pub is_dir: bool,
}

/// Report of a full archive extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of regular files written.
    pub files_extracted: usize,
    /// Number of directories created.
    pub directories_created: usize,
    /// Number of symlinks recreated.
    pub symlinks_created: usize,
    /// Total bytes written to disk.
    pub bytes_written: u64,
}

/// Reader over one open zip-family container.
///
/// Each instance owns its file handle; concurrent extraction of
/// different archives needs no shared state.
pub struct ArchiveReader {
    zip: zip::ZipArchive<File>,
    options: PeekOptions,
}

impl ArchiveReader {
    /// Opens an archive and parses its central directory.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::CorruptArchive`] when the central
    /// directory cannot be parsed, or [`PreviewError::Io`] when the file
    /// cannot be opened.
    pub fn open(path: &Path, options: &PeekOptions) -> Result<Self> {
        let file = File::open(path)?;
        let zip = zip::ZipArchive::new(file).map_err(corrupt)?;
        if zip.len() > options.max_entry_count {
            return Err(PreviewError::CorruptArchive(format!(
                "archive lists {} entries, limit is {}",
                zip.len(),
                options.max_entry_count
            )));
        }
        Ok(Self {
            zip,
            options: options.clone(),
        })
    }

    /// Lists all entries in central-directory order.
    ///
    /// Safe to call repeatedly; each call is a fresh pass over the same
    /// snapshot.
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.zip.len());
        for index in 0..self.zip.len() {
            let entry = self.zip.by_index_raw(index).map_err(corrupt)?;
            entries.push(ArchiveEntry {
                path: entry.name().to_string(),
                size: entry.size(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(entries)
    }

    /// Reads the full contents of one entry by exact path match, without
    /// decompressing siblings.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::EntryNotFound`] when no entry has that
    /// exact path, [`PreviewError::CorruptArchive`] when the entry's
    /// local data is damaged or its declared size exceeds the configured
    /// ceiling.
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let max = self.options.max_entry_size;
        let entry = match self.zip.by_name(path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(PreviewError::EntryNotFound {
                    path: path.to_string(),
                });
            }
            Err(err) => return Err(corrupt(err)),
        };
        if entry.size() > max {
            return Err(PreviewError::CorruptArchive(format!(
                "entry {path} declares {} bytes, ceiling is {max}",
                entry.size()
            )));
        }
        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        // Cap the read one past the declared ceiling so a lying header
        // cannot stream unbounded data. Saturating keeps a no-limit
        // ceiling of u64::MAX from wrapping to zero.
        entry.take(max.saturating_add(1)).read_to_end(&mut buf)?;
        if buf.len() as u64 > max {
            return Err(PreviewError::CorruptArchive(format!(
                "entry {path} inflates past the {max} byte ceiling"
            )));
        }
        Ok(buf)
    }

    /// Returns whether an entry with this exact path exists.
    pub fn contains(&mut self, path: &str) -> bool {
        self.zip.by_name(path).is_ok()
    }

    /// Unpacks the whole archive under `target`, preserving directory
    /// structure and symlinks.
    ///
    /// Every entry path is validated before anything is written: an
    /// entry with `..` segments, an absolute path, or a NUL byte fails
    /// the whole call with [`PreviewError::UnsafeEntryPath`] and leaves
    /// the target untouched.
    pub fn extract_all(&mut self, target: &Path) -> Result<ExtractionReport> {
        // Validation pass first so a hostile entry late in the index
        // cannot leave a half-written tree behind.
        let mut planned = Vec::with_capacity(self.zip.len());
        for index in 0..self.zip.len() {
            let entry = self.zip.by_index_raw(index).map_err(corrupt)?;
            planned.push(safe_relative_path(entry.name())?);
        }

        let mut report = ExtractionReport::default();
        for (index, relative) in planned.into_iter().enumerate() {
            let mut entry = self.zip.by_index(index).map_err(corrupt)?;
            let dest = target.join(&relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&dest)?;
                report.directories_created += 1;
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }

            if is_symlink_entry(entry.unix_mode()) {
                let mut target_bytes = Vec::new();
                entry.take(4096).read_to_end(&mut target_bytes)?;
                let link_target = String::from_utf8(target_bytes).map_err(|_| {
                    PreviewError::UnsafeEntryPath {
                        path: relative.clone(),
                    }
                })?;
                // The link itself lands inside the target; its
                // destination must not point back out.
                safe_relative_path(&link_target).map_err(|_| PreviewError::UnsafeEntryPath {
                    path: relative.clone(),
                })?;
                make_symlink(&link_target, &dest)?;
                report.symlinks_created += 1;
                continue;
            }

            let mut out = File::create(&dest)?;
            let written = std::io::copy(&mut entry, &mut out)?;
            report.files_extracted += 1;
            report.bytes_written += written;
        }
        Ok(report)
    }
}

fn corrupt(err: ZipError) -> PreviewError {
    match err {
        ZipError::Io(io) => PreviewError::Io(io),
        other => PreviewError::CorruptArchive(other.to_string()),
    }
}

fn is_symlink_entry(unix_mode: Option<u32>) -> bool {
    const S_IFMT: u32 = 0o170_000;
    const S_IFLNK: u32 = 0o120_000;
    unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK)
}

#[cfg(unix)]
fn make_symlink(link_target: &str, dest: &Path) -> Result<()> {
    Ok(std::os::unix::fs::symlink(link_target, dest)?)
}

#[cfg(not(unix))]
fn make_symlink(link_target: &str, dest: &Path) -> Result<()> {
    // No symlinks to speak of; materialize the target text so bundle
    // layout stays inspectable.
    Ok(std::fs::write(dest, link_target)?)
}

/// Validates an archive entry path and converts it to a relative
/// `PathBuf` with `.` components dropped.
///
/// # Errors
///
/// Returns [`PreviewError::UnsafeEntryPath`] for empty paths, NUL bytes,
/// absolute paths, and any `..` segment.
pub fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let unsafe_path = || PreviewError::UnsafeEntryPath {
        path: PathBuf::from(name),
    };
    if name.is_empty() || name.contains('\0') {
        return Err(unsafe_path());
    }
    let path = Path::new(name);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(relative)
}
