//! Provisioning profile payload extraction.
//!
//! Mobile provisioning profiles are a plist wrapped in a CMS
//! signed-message envelope. The envelope is located by scanning for the
//! plist start and end markers inside the signed bytes rather than by
//! parsing the outer DER structure; verifying the signature is out of
//! scope, so a tampered profile still previews on a best-effort basis.
//! The scan is a known-fragile heuristic: adversarial input could place
//! decoy markers ahead of the real payload, and such a file would
//! mis-preview rather than fail.

use crate::MetadataRecord;
use crate::PreviewError;
use crate::Result;
use crate::plist;
use crate::plist::Value;

const XML_START_MARKERS: [&[u8]; 2] = [b"<?xml", b"<plist"];
const XML_END_MARKER: &[u8] = b"</plist>";

/// Locates the plist payload inside a provisioning profile.
///
/// A bare plist (either serialization) is passed through unchanged, so
/// the same entry point serves desktop profiles, already-unwrapped
/// payloads, and signed envelopes. Inside an envelope, an XML payload is
/// bounded by its start and end markers; a binary payload is bounded by
/// finding the `bplist00` magic and recovering the document length from
/// its trailer.
///
/// # Errors
///
/// Returns [`PreviewError::MalformedPlist`] when no plist payload can be
/// located.
pub fn envelope_payload(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.starts_with(plist::BPLIST_MAGIC) || XML_START_MARKERS.iter().any(|m| bytes.starts_with(m)) {
        return Ok(bytes);
    }
    for marker in XML_START_MARKERS {
        if let Some(start) = find(bytes, marker) {
            let end = rfind(bytes, XML_END_MARKER)
                .filter(|end| *end > start)
                .ok_or_else(|| {
                    PreviewError::MalformedPlist("signed envelope has no plist end marker".into())
                })?;
            return Ok(&bytes[start..end + XML_END_MARKER.len()]);
        }
    }
    if let Some(start) = find(bytes, plist::BPLIST_MAGIC) {
        let end = plist::embedded_len(&bytes[start..])
            .map(|len| start + len)
            .ok_or_else(|| {
                PreviewError::MalformedPlist(
                    "signed envelope has no usable binary plist trailer".into(),
                )
            })?;
        return Ok(&bytes[start..end]);
    }
    Err(PreviewError::MalformedPlist(
        "no plist payload found in signed envelope".into(),
    ))
}

/// Decodes the plist payload of a provisioning profile.
pub fn decode_profile(bytes: &[u8]) -> Result<Value> {
    plist::decode(envelope_payload(bytes)?)
}

/// Copies provisioning profile fields onto a metadata record.
///
/// All fields are optional; unknown and missing keys are simply skipped.
pub fn apply_profile(record: &mut MetadataRecord, profile: &Value) {
    record.profile_name = profile.get_str("Name").map(str::to_string);
    record.profile_uuid = profile.get_str("UUID").map(str::to_string);
    record.team_name = profile.get_str("TeamName").map(str::to_string);
    record.team_identifier = profile
        .get_array("TeamIdentifier")
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_string);
    record.platform = profile.get_array("Platform").map(|platforms| {
        platforms
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    });
    record.creation_date = profile.get_date("CreationDate");
    record.expiration_date = profile.get_date("ExpirationDate");
    record.provisioned_device_count = profile.get_array("ProvisionedDevices").map(<[Value]>::len);
    record.provisions_all_devices = profile.get_bool("ProvisionsAllDevices");

    if let Some(entitlements) = profile.get_dict("Entitlements") {
        if record.bundle_identifier.is_none() {
            record.bundle_identifier = entitlements
                .get("application-identifier")
                .or_else(|| entitlements.get("com.apple.application-identifier"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        record.entitlements = Some(entitlements.clone());
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ContainerKind;
    use crate::test_utils::sample_profile_plist;
    use crate::test_utils::wrap_in_fake_envelope;

    #[test]
    fn test_envelope_payload_passthrough_for_bare_plists() {
        let xml = b"<?xml version=\"1.0\"?><plist version=\"1.0\"><dict/></plist>";
        assert_eq!(envelope_payload(xml).unwrap(), xml.as_slice());

        let binary = plist::encode_binary(&Value::Integer(1));
        assert_eq!(envelope_payload(&binary).unwrap(), binary.as_slice());
    }

    #[test]
    fn test_envelope_payload_marker_scan() {
        let inner = b"<?xml version=\"1.0\"?><plist version=\"1.0\"><dict>\
                      <key>Name</key><string>P</string></dict></plist>";
        let signed = wrap_in_fake_envelope(inner);
        assert_eq!(envelope_payload(&signed).unwrap(), inner.as_slice());
    }

    #[test]
    fn test_envelope_payload_binary_plist() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("Name".to_string(), Value::String("Binary Profile".into()));
        let inner = plist::encode_binary(&Value::Dict(map));

        let signed = wrap_in_fake_envelope(&inner);
        assert_eq!(envelope_payload(&signed).unwrap(), inner.as_slice());

        let profile = decode_profile(&signed).unwrap();
        assert_eq!(profile.get_str("Name"), Some("Binary Profile"));
    }

    #[test]
    fn test_envelope_payload_end_before_start_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x30\x82</plist>garbage<?xml more garbage");
        assert!(matches!(
            envelope_payload(&bytes),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_envelope_payload_no_markers() {
        assert!(matches!(
            envelope_payload(b"\x30\x82\x01\x02 just DER bytes"),
            Err(PreviewError::MalformedPlist(_))
        ));
    }

    #[test]
    fn test_decode_profile_and_apply() {
        let signed = wrap_in_fake_envelope(sample_profile_plist().as_bytes());
        let profile = decode_profile(&signed).unwrap();

        let mut record = MetadataRecord::for_kind(ContainerKind::MobileProvision);
        apply_profile(&mut record, &profile);

        assert_eq!(record.profile_name.as_deref(), Some("My Ad Hoc Profile"));
        assert_eq!(
            record.profile_uuid.as_deref(),
            Some("f0e1d2c3-0000-1111-2222-333344445555")
        );
        assert_eq!(record.team_name.as_deref(), Some("Example Team"));
        assert_eq!(record.team_identifier.as_deref(), Some("ABCDE12345"));
        assert_eq!(record.platform.as_deref(), Some(&["iOS".to_string()][..]));
        assert_eq!(record.provisioned_device_count, Some(2));
        assert_eq!(record.provisions_all_devices, None);
        assert!(record.creation_date.is_some());
        assert!(record.expiration_date.is_some());

        let entitlements = record.entitlements.unwrap();
        assert_eq!(
            entitlements.get("get-task-allow"),
            Some(&Value::Boolean(false))
        );
        assert_eq!(
            record.bundle_identifier.as_deref(),
            Some("ABCDE12345.com.example.app")
        );
    }

    #[test]
    fn test_apply_profile_keeps_existing_bundle_identifier() {
        let signed = wrap_in_fake_envelope(sample_profile_plist().as_bytes());
        let profile = decode_profile(&signed).unwrap();

        let mut record = MetadataRecord::for_kind(ContainerKind::AppArchive);
        record.bundle_identifier = Some("com.example.app".into());
        apply_profile(&mut record, &profile);
        assert_eq!(record.bundle_identifier.as_deref(), Some("com.example.app"));
    }
}
