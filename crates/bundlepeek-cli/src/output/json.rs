//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bundlepeek_core::ArchiveEntry;
use bundlepeek_core::ExtractionReport;
use bundlepeek_core::IconAsset;
use bundlepeek_core::MetadataRecord;
use bundlepeek_core::plist::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

/// Converts a plist value tree into JSON. Dates become RFC 3339 strings
/// and raw bytes become base64, since JSON has no native form for
/// either.
fn plist_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Real(r) => serde_json::Number::from_f64(*r)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
        Value::Data(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
        Value::Uid(u) => serde_json::Value::from(*u),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(plist_to_json).collect())
        }
        Value::Dict(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), plist_to_json(v)))
                .collect(),
        ),
    }
}

fn dict_to_json(map: &BTreeMap<String, Value>) -> serde_json::Value {
    plist_to_json(&Value::Dict(map.clone()))
}

impl OutputFormatter for JsonFormatter {
    fn format_record(&self, record: &MetadataRecord) -> Result<()> {
        #[derive(Serialize)]
        struct IconOutput {
            name: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            bytes_base64: Option<String>,
        }

        #[derive(Serialize)]
        struct RecordOutput {
            kind: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            bundle_identifier: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            display_name: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            short_version: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            build_version: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            minimum_os_version: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            device_family: Option<Vec<i64>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            icon: Option<IconOutput>,
            #[serde(skip_serializing_if = "Option::is_none")]
            expiration_date: Option<String>,
            expiration_status: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            entitlements: Option<serde_json::Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            profile_name: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            profile_uuid: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            team_name: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            team_identifier: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            platform: Option<Vec<String>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            creation_date: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            provisioned_device_count: Option<usize>,
            #[serde(skip_serializing_if = "Option::is_none")]
            provisions_all_devices: Option<bool>,
            raw_top_level_keys: Vec<String>,
        }

        let icon = record.icon.as_ref().map(|asset| match asset {
            IconAsset::Path(path) => IconOutput {
                name: path.display().to_string(),
                bytes_base64: None,
            },
            IconAsset::Bytes { name, data } => IconOutput {
                name: name.clone(),
                bytes_base64: Some(STANDARD.encode(data)),
            },
        });

        let data = RecordOutput {
            kind: record.kind.name().to_string(),
            bundle_identifier: record.bundle_identifier.clone(),
            display_name: record.display_name.clone(),
            short_version: record.short_version.clone(),
            build_version: record.build_version.clone(),
            minimum_os_version: record.minimum_os_version.clone(),
            device_family: record.device_family.clone(),
            icon,
            expiration_date: record.expiration_date.map(|d| d.to_rfc3339()),
            expiration_status: record.expiration_status.name().to_string(),
            entitlements: record.entitlements.as_ref().map(dict_to_json),
            profile_name: record.profile_name.clone(),
            profile_uuid: record.profile_uuid.clone(),
            team_name: record.team_name.clone(),
            team_identifier: record.team_identifier.clone(),
            platform: record.platform.clone(),
            creation_date: record.creation_date.map(|d| d.to_rfc3339()),
            provisioned_device_count: record.provisioned_device_count,
            provisions_all_devices: record.provisions_all_devices,
            raw_top_level_keys: record.raw_top_level_keys.keys().cloned().collect(),
        };

        let output = JsonOutput::success("inspect", data);
        Self::output(&output)
    }

    fn format_entries(
        &self,
        entries: &[ArchiveEntry],
        _long: bool,
        _human_readable: bool,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct EntryOutput {
            path: String,
            size: u64,
            is_dir: bool,
        }

        #[derive(Serialize)]
        struct ListOutput {
            entries: Vec<EntryOutput>,
            total_entries: usize,
        }

        let data = ListOutput {
            entries: entries
                .iter()
                .map(|e| EntryOutput {
                    path: e.path.clone(),
                    size: e.size,
                    is_dir: e.is_dir,
                })
                .collect(),
            total_entries: entries.len(),
        };

        let output = JsonOutput::success("list", data);
        Self::output(&output)
    }

    fn format_extraction_result(&self, report: &ExtractionReport) -> Result<()> {
        #[derive(Serialize)]
        struct ExtractionOutput {
            files_extracted: usize,
            directories_created: usize,
            symlinks_created: usize,
            bytes_written: u64,
        }

        let data = ExtractionOutput {
            files_extracted: report.files_extracted,
            directories_created: report.directories_created,
            symlinks_created: report.symlinks_created,
            bytes_written: report.bytes_written,
        };

        let output = JsonOutput::success("unpack", data);
        Self::output(&output)
    }

    fn format_icon_saved(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct IconSavedOutput {
            path: String,
        }

        let output = JsonOutput::success(
            "icon",
            IconSavedOutput {
                path: path.display().to_string(),
            },
        );
        Self::output(&output)
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("unknown", format!("{error:?}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData {
            message: String,
        }

        let output = JsonOutput::success(
            "warning",
            WarningData {
                message: message.to_string(),
            },
        );
        let _ = Self::output(&output);
    }
}
