//! Inspect command implementation.

use crate::cli::InspectArgs;
use crate::error::add_container_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use bundlepeek_core::PeekOptions;
use bundlepeek_core::peek;

pub fn execute(args: &InspectArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let defaults = PeekOptions::default();
    let options = PeekOptions {
        expiry_window_days: args.expiry_window,
        max_entry_size: args.max_entry_size.unwrap_or(defaults.max_entry_size),
        ..defaults
    };

    let record = add_container_context(
        peek(&args.path, args.type_tag.as_deref(), &options),
        &args.path,
    )?;

    formatter.format_record(&record)
}
