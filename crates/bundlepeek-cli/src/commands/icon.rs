//! Icon command implementation.

use crate::cli::IconArgs;
use crate::error::add_container_context;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use bundlepeek_core::IconAsset;
use bundlepeek_core::PeekOptions;
use bundlepeek_core::peek;
use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;

pub fn execute(args: &IconArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let record = add_container_context(
        peek(&args.path, args.type_tag.as_deref(), &PeekOptions::default()),
        &args.path,
    )?;

    let Some(icon) = record.icon else {
        bail!(
            "no icon found in '{}'\n\
             HINT: The bundle declares no icon files, or none of them exist.",
            args.path.display()
        );
    };

    match icon {
        IconAsset::Bytes { name, data } => {
            let target = match &args.output {
                Some(path) => path.clone(),
                None => PathBuf::from(
                    Path::new(&name)
                        .file_name()
                        .unwrap_or_else(|| OsStr::new("icon.png")),
                ),
            };
            std::fs::write(&target, &data)
                .with_context(|| format!("failed to write '{}'", target.display()))?;
            formatter.format_icon_saved(&target)
        }
        IconAsset::Path(source) => match &args.output {
            Some(target) => {
                std::fs::copy(&source, target)
                    .with_context(|| format!("failed to copy '{}'", source.display()))?;
                formatter.format_icon_saved(target)
            }
            // The icon already sits on disk inside the bundle.
            None => formatter.format_icon_saved(&source),
        },
    }
}
