//! Unpack command implementation.

use crate::cli::UnpackArgs;
use crate::error::add_container_context;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use bundlepeek_core::ArchiveReader;
use bundlepeek_core::PeekOptions;
use std::env;

pub fn execute(args: &UnpackArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };

    let defaults = PeekOptions::default();
    let options = PeekOptions {
        max_entry_count: args.max_entries,
        max_entry_size: args.max_entry_size.unwrap_or(defaults.max_entry_size),
        ..defaults
    };

    let mut reader =
        add_container_context(ArchiveReader::open(&args.archive, &options), &args.archive)?;
    let report = add_container_context(reader.extract_all(&output_dir), &args.archive)?;

    formatter.format_extraction_result(&report)
}
