//! The externally visible extraction result.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Days;
use chrono::Utc;

use crate::ContainerKind;
use crate::plist::Value;

/// Where a resolved icon lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconAsset {
    /// Icon file on disk (directory-backed bundles).
    Path(PathBuf),
    /// Icon bytes pulled out of an archive, with the entry name they
    /// came from.
    Bytes {
        /// Archive-relative name of the icon entry.
        name: String,
        /// Raw PNG bytes, not decoded or recompressed here.
        data: Vec<u8>,
    },
}

/// Expiration status of a provisioning profile, at calendar-day
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationStatus {
    /// Expiration day is past.
    Expired,
    /// Expiration day falls within the lookahead window (inclusive).
    ExpiringSoon,
    /// Expiration day is beyond the window.
    Valid,
    /// No expiration date was found.
    Unknown,
}

impl ExpirationStatus {
    /// Stable lowercase name, used in CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::ExpiringSoon => "expiring-soon",
            Self::Valid => "valid",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Computes the expiration status of `expiry` as seen from `now`.
///
/// Pure function of its arguments, compared at calendar-day granularity:
/// a profile expiring later today is not yet expired, and the day
/// exactly at `now + window_days` still counts as expiring soon.
#[must_use]
pub fn expiration_status(
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window_days: u32,
) -> ExpirationStatus {
    let Some(expiry) = expiry else {
        return ExpirationStatus::Unknown;
    };
    let expiry_day = expiry.date_naive();
    let today = now.date_naive();
    if expiry_day < today {
        ExpirationStatus::Expired
    } else if expiry_day <= today.checked_add_days(Days::new(u64::from(window_days))).unwrap_or(today) {
        ExpirationStatus::ExpiringSoon
    } else {
        ExpirationStatus::Valid
    }
}

/// Normalized preview metadata for one container.
///
/// Constructed fresh per extraction call and immutable once returned;
/// nothing is cached or shared across calls. Every field beyond the kind
/// is optional: a missing descriptor or icon degrades the record, never
/// the call.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    /// The container kind the classifier selected.
    pub kind: ContainerKind,
    /// `CFBundleIdentifier`, or the profile's app identifier.
    pub bundle_identifier: Option<String>,
    /// `CFBundleDisplayName` or `CFBundleName`.
    pub display_name: Option<String>,
    /// `CFBundleShortVersionString`.
    pub short_version: Option<String>,
    /// `CFBundleVersion`.
    pub build_version: Option<String>,
    /// `MinimumOSVersion` or `LSMinimumSystemVersion`.
    pub minimum_os_version: Option<String>,
    /// `UIDeviceFamily` entries (1 = iPhone, 2 = iPad, ...).
    pub device_family: Option<Vec<i64>>,
    /// Best-resolution icon found for the bundle.
    pub icon: Option<IconAsset>,
    /// Provisioning profile expiration date.
    pub expiration_date: Option<DateTime<Utc>>,
    /// Derived from `expiration_date` at extraction time.
    pub expiration_status: ExpirationStatus,
    /// Entitlements mapping from the provisioning profile.
    pub entitlements: Option<BTreeMap<String, Value>>,

    // Provisioning profile details.
    /// Profile name.
    pub profile_name: Option<String>,
    /// Profile UUID.
    pub profile_uuid: Option<String>,
    /// Team display name.
    pub team_name: Option<String>,
    /// First team identifier.
    pub team_identifier: Option<String>,
    /// Target platforms declared by the profile.
    pub platform: Option<Vec<String>>,
    /// Profile creation date.
    pub creation_date: Option<DateTime<Utc>>,
    /// Number of provisioned device UDIDs.
    pub provisioned_device_count: Option<usize>,
    /// Whether the profile provisions all devices (enterprise).
    pub provisions_all_devices: Option<bool>,

    /// Top-level keys of the decoded descriptor, kept as a debug
    /// fallback for callers that want to show unrecognized fields.
    pub raw_top_level_keys: BTreeMap<String, Value>,
}

impl MetadataRecord {
    /// Creates an otherwise-empty record for a container kind.
    #[must_use]
    pub fn for_kind(kind: ContainerKind) -> Self {
        Self {
            kind,
            bundle_identifier: None,
            display_name: None,
            short_version: None,
            build_version: None,
            minimum_os_version: None,
            device_family: None,
            icon: None,
            expiration_date: None,
            expiration_status: ExpirationStatus::Unknown,
            entitlements: None,
            profile_name: None,
            profile_uuid: None,
            team_name: None,
            team_identifier: None,
            platform: None,
            creation_date: None,
            provisioned_device_count: None,
            provisions_all_devices: None,
            raw_top_level_keys: BTreeMap::new(),
        }
    }

    /// Best available human-readable title: display name, then profile
    /// name, then bundle identifier.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.profile_name.as_deref())
            .or(self.bundle_identifier.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_expiration_status_absent() {
        assert_eq!(
            expiration_status(None, day(2026, 8, 1), 7),
            ExpirationStatus::Unknown
        );
    }

    #[test]
    fn test_expiration_status_expired() {
        assert_eq!(
            expiration_status(Some(day(2026, 7, 31)), day(2026, 8, 1), 7),
            ExpirationStatus::Expired
        );
        assert_eq!(
            expiration_status(Some(day(2020, 1, 1)), day(2026, 8, 1), 7),
            ExpirationStatus::Expired
        );
    }

    #[test]
    fn test_expiration_status_same_day_is_not_expired() {
        // Calendar-day granularity: expiring later today means today
        // still counts as within the window, not expired.
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 23, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2026, 8, 1, 1, 0, 0).unwrap();
        assert_eq!(
            expiration_status(Some(expiry), now, 7),
            ExpirationStatus::ExpiringSoon
        );
    }

    #[test]
    fn test_expiration_status_window_boundary_inclusive() {
        let now = day(2026, 8, 1);
        assert_eq!(
            expiration_status(Some(day(2026, 8, 8)), now, 7),
            ExpirationStatus::ExpiringSoon
        );
        assert_eq!(
            expiration_status(Some(day(2026, 8, 9)), now, 7),
            ExpirationStatus::Valid
        );
    }

    #[test]
    fn test_expiration_status_zero_window() {
        let now = day(2026, 8, 1);
        assert_eq!(
            expiration_status(Some(day(2026, 8, 1)), now, 0),
            ExpirationStatus::ExpiringSoon
        );
        assert_eq!(
            expiration_status(Some(day(2026, 8, 2)), now, 0),
            ExpirationStatus::Valid
        );
    }

    #[test]
    fn test_record_for_kind() {
        let record = MetadataRecord::for_kind(ContainerKind::Framework);
        assert_eq!(record.kind, ContainerKind::Framework);
        assert_eq!(record.expiration_status, ExpirationStatus::Unknown);
        assert!(record.bundle_identifier.is_none());
        assert!(record.raw_top_level_keys.is_empty());
    }

    #[test]
    fn test_record_title_preference() {
        let mut record = MetadataRecord::for_kind(ContainerKind::AppBundle);
        assert_eq!(record.title(), None);
        record.bundle_identifier = Some("com.example.app".into());
        assert_eq!(record.title(), Some("com.example.app"));
        record.profile_name = Some("Ad Hoc Profile".into());
        assert_eq!(record.title(), Some("Ad Hoc Profile"));
        record.display_name = Some("Example".into());
        assert_eq!(record.title(), Some("Example"));
    }
}
