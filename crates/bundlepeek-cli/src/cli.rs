//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bundlepeek")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show preview metadata for an archive, bundle, or profile
    Inspect(InspectArgs),
    /// List archive contents without extraction
    List(ListArgs),
    /// Extract the best-resolution icon
    Icon(IconArgs),
    /// Unpack an archive into a directory
    Unpack(UnpackArgs),
    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the container (.ipa, .app, .mobileprovision, .xcarchive, ...)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Declared type tag, overriding extension-based detection
    #[arg(long = "type", value_name = "TAG")]
    pub type_tag: Option<String>,

    /// Days ahead a profile expiration counts as expiring soon
    #[arg(long, default_value = "7", value_name = "DAYS")]
    pub expiry_window: u32,

    /// Maximum size of a single archive entry in bytes
    #[arg(long, value_parser = parse_byte_size, value_name = "SIZE")]
    pub max_entry_size: Option<u64>,
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Path to the archive file
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Show detailed entry information
    #[arg(short, long)]
    pub long: bool,

    /// Show sizes in human-readable format
    #[arg(short = 'H', long)]
    pub human_readable: bool,
}

#[derive(clap::Args)]
pub struct IconArgs {
    /// Path to the container
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output file (default: icon name in the current directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Declared type tag, overriding extension-based detection
    #[arg(long = "type", value_name = "TAG")]
    pub type_tag: Option<String>,
}

#[derive(clap::Args)]
pub struct UnpackArgs {
    /// Path to the archive file
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Output directory (default: current directory)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of entries to accept
    #[arg(long, default_value = "100000")]
    pub max_entries: usize,

    /// Maximum size of a single entry in bytes
    #[arg(long, value_parser = parse_byte_size, value_name = "SIZE")]
    pub max_entry_size: Option<u64>,
}

/// Parse byte size with optional suffix (K, M, G, T)
#[allow(clippy::option_if_let_else)]
pub fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty byte size".to_string());
    }

    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('T') {
        (stripped, 1024_u64.pow(4))
    } else if let Some(stripped) = s.strip_suffix('G') {
        (stripped, 1024_u64.pow(3))
    } else if let Some(stripped) = s.strip_suffix('M') {
        (stripped, 1024_u64.pow(2))
    } else if let Some(stripped) = s.strip_suffix('K') {
        (stripped, 1024)
    } else {
        (s, 1)
    };

    num_str
        .parse::<u64>()
        .map_err(|_| format!("invalid byte size: {s}"))
        .and_then(|n| {
            n.checked_mul(multiplier)
                .ok_or_else(|| format!("byte size overflow: {s}"))
        })
}
