//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use bundlepeek_core::ArchiveEntry;
use bundlepeek_core::ExpirationStatus;
use bundlepeek_core::ExtractionReport;
use bundlepeek_core::IconAsset;
use bundlepeek_core::MetadataRecord;
use chrono::DateTime;
use chrono::Utc;
use console::Term;
use console::style;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_date(date: DateTime<Utc>) -> String {
        date.format("%Y-%m-%d %H:%M UTC").to_string()
    }

    fn device_family_name(family: i64) -> &'static str {
        match family {
            1 => "iPhone",
            2 => "iPad",
            3 => "Apple TV",
            4 => "Apple Watch",
            _ => "unknown",
        }
    }

    fn styled_status(&self, status: ExpirationStatus) -> String {
        if !self.use_colors {
            return status.name().to_string();
        }
        match status {
            ExpirationStatus::Expired => style(status.name()).red().bold().to_string(),
            ExpirationStatus::ExpiringSoon => style(status.name()).yellow().bold().to_string(),
            ExpirationStatus::Valid => style(status.name()).green().to_string(),
            ExpirationStatus::Unknown => style(status.name()).dim().to_string(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn field(&self, label: &str, value: &str) {
        self.line(&format!("  {label:<16} {value}"));
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_record(&self, record: &MetadataRecord) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let title = record.title().unwrap_or("(untitled)");
        if self.use_colors {
            self.line(&format!("{} [{}]", style(title).bold(), record.kind));
        } else {
            self.line(&format!("{title} [{}]", record.kind));
        }

        if let Some(id) = &record.bundle_identifier {
            self.field("Identifier:", id);
        }
        match (&record.short_version, &record.build_version) {
            (Some(short), Some(build)) => self.field("Version:", &format!("{short} ({build})")),
            (Some(short), None) => self.field("Version:", short),
            (None, Some(build)) => self.field("Build:", build),
            (None, None) => {}
        }
        if let Some(min_os) = &record.minimum_os_version {
            self.field("Minimum OS:", min_os);
        }
        if let Some(families) = &record.device_family {
            let names: Vec<&str> = families
                .iter()
                .map(|f| Self::device_family_name(*f))
                .collect();
            self.field("Devices:", &names.join(", "));
        }

        if let Some(name) = &record.profile_name {
            self.line("");
            self.field("Profile:", name);
            if let Some(team) = &record.team_name {
                let id = record.team_identifier.as_deref().unwrap_or("-");
                self.field("Team:", &format!("{team} ({id})"));
            }
            if let Some(platforms) = &record.platform {
                self.field("Platform:", &platforms.join(", "));
            }
            if record.provisions_all_devices == Some(true) {
                self.field("Provisioning:", "all devices (enterprise)");
            } else if let Some(count) = record.provisioned_device_count {
                self.field("Provisioning:", &format!("{count} registered devices"));
            }
            if self.verbose {
                if let Some(uuid) = &record.profile_uuid {
                    self.field("UUID:", uuid);
                }
                if let Some(created) = record.creation_date {
                    self.field("Created:", &Self::format_date(created));
                }
            }
        }

        if let Some(expiry) = record.expiration_date {
            self.field(
                "Expires:",
                &format!(
                    "{} [{}]",
                    Self::format_date(expiry),
                    self.styled_status(record.expiration_status)
                ),
            );
        }

        if let Some(entitlements) = &record.entitlements {
            if self.verbose {
                self.line("");
                self.line("  Entitlements:");
                for key in entitlements.keys() {
                    self.line(&format!("    {key}"));
                }
            } else {
                self.field("Entitlements:", &format!("{}", entitlements.len()));
            }
        }

        match &record.icon {
            Some(IconAsset::Path(path)) => self.field("Icon:", &path.display().to_string()),
            Some(IconAsset::Bytes { name, data }) => {
                self.field("Icon:", &format!("{name} ({})", Self::format_size(data.len() as u64)));
            }
            None => {}
        }

        if self.verbose && !record.raw_top_level_keys.is_empty() {
            self.line("");
            self.line("  Descriptor keys:");
            for key in record.raw_top_level_keys.keys() {
                self.line(&format!("    {key}"));
            }
        }

        Ok(())
    }

    fn format_entries(
        &self,
        entries: &[ArchiveEntry],
        long: bool,
        human_readable: bool,
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut files = 0usize;
        let mut total = 0u64;
        for entry in entries {
            if long {
                let size_str = if human_readable {
                    Self::format_size(entry.size)
                } else {
                    entry.size.to_string()
                };
                let type_char = if entry.is_dir { "d" } else { "-" };
                self.line(&format!("{type_char} {size_str:>10}  {}", entry.path));
            } else {
                self.line(&entry.path);
            }
            if !entry.is_dir {
                files += 1;
                total += entry.size;
            }
        }

        if long {
            self.line("");
            self.line(&format!("Total: {files} files, {}", Self::format_size(total)));
        }

        Ok(())
    }

    fn format_extraction_result(&self, report: &ExtractionReport) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if self.use_colors {
            self.line(&format!("{} Unpack complete", style("✓").green().bold()));
        } else {
            self.line("Unpack complete");
        }

        self.line(&format!("  Files extracted: {}", report.files_extracted));
        self.line(&format!("  Directories: {}", report.directories_created));
        self.line(&format!(
            "  Total size: {}",
            Self::format_size(report.bytes_written)
        ));

        if self.verbose {
            self.line(&format!("  Symlinks: {}", report.symlinks_created));
        }

        Ok(())
    }

    fn format_icon_saved(&self, path: &Path) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if self.use_colors {
            self.line(&format!(
                "{} Icon saved: {}",
                style("✓").green().bold(),
                path.display()
            ));
        } else {
            self.line(&format!("Icon saved: {}", path.display()));
        }

        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        if self.use_colors {
            self.line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            self.line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            self.line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            self.line(&format!("WARNING: {message}"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(HumanFormatter::format_size(0), "0 B");
        assert_eq!(HumanFormatter::format_size(1023), "1023 B");
        assert_eq!(HumanFormatter::format_size(1024), "1.0 KB");
        assert_eq!(HumanFormatter::format_size(1536 * 1024), "1.5 MB");
        assert_eq!(HumanFormatter::format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_device_family_names() {
        assert_eq!(HumanFormatter::device_family_name(1), "iPhone");
        assert_eq!(HumanFormatter::device_family_name(2), "iPad");
        assert_eq!(HumanFormatter::device_family_name(99), "unknown");
    }

    #[test]
    fn test_format_date() {
        use chrono::TimeZone;
        let date = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        assert_eq!(HumanFormatter::format_date(date), "2026-01-15 09:30 UTC");
    }
}
