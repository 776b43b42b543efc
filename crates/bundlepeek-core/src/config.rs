//! Extraction options.

/// Options for one metadata extraction call.
///
/// This is the only configuration surface of the core: there is no config
/// file and no global state. Pass by reference; the struct is cheap to
/// clone.
///
/// # Examples
///
/// ```
/// use bundlepeek_core::PeekOptions;
///
/// let options = PeekOptions {
///     expiry_window_days: 14,
///     ..Default::default()
/// };
/// assert_eq!(options.expiry_window_days, 14);
/// ```
#[derive(Debug, Clone)]
pub struct PeekOptions {
    /// Lookahead window for the expiring-soon status, in calendar days.
    pub expiry_window_days: u32,

    /// Ceiling on the uncompressed size of any single entry read out of
    /// an archive. Descriptors and icons are small; anything near this
    /// limit is hostile or mislabeled.
    pub max_entry_size: u64,

    /// Ceiling on the number of entries accepted when listing or
    /// unpacking an archive.
    pub max_entry_count: usize,
}

impl Default for PeekOptions {
    /// Defaults: 7-day expiry window, 256 MB per entry, 100,000 entries.
    fn default() -> Self {
        Self {
            expiry_window_days: 7,
            max_entry_size: 256 * 1024 * 1024,
            max_entry_count: 100_000,
        }
    }
}
