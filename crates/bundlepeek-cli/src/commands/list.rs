//! List command implementation.

use crate::cli::ListArgs;
use crate::error::add_container_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use bundlepeek_core::ArchiveReader;
use bundlepeek_core::PeekOptions;

pub fn execute(args: &ListArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let options = PeekOptions::default();
    let mut reader =
        add_container_context(ArchiveReader::open(&args.archive, &options), &args.archive)?;
    let entries = add_container_context(reader.entries(), &args.archive)?;

    formatter.format_entries(&entries, args.long, args.human_readable)
}
