//! Command-line interface definitions.
//!
//! Global options (verbosity, colour, error format, config file, report
//! format) apply to every subcommand. Every flag that has a config key is
//! optional here; an absent flag leaves the configured value in place.
//!
//! # Example
//!
//! ```bash
//! # Consolidate two recovery trees, TestDisk output first
//! tombraider process testdisk/ photorec/ --dest sorted/ --known nsrl.txt
//!
//! # Drop everything classified as irrelevant, report as JSON
//! tombraider --format json process recup/ --dest sorted/ --blacklist drop.txt
//!
//! # Build a known set from a clean system image
//! tombraider hashset /mnt/clean --output clean.txt
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::dedupe::KnownSetBacking;
use crate::scanner::FingerprintMode;

/// Consolidate, deduplicate and sort recovered files.
///
/// Files from one or more recovery trees are fingerprinted, filtered against
/// a known set and against each other, classified into categories and moved
/// to `<dest>/<Category>/<flattened path>`.
#[derive(Debug, Parser)]
#[command(name = "tombraider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: config.toml in the platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fingerprint, deduplicate, classify and relocate recovered files
    Process(ProcessArgs),
    /// Flatten a tree in place
    Condense(CondenseArgs),
    /// Write an index of a tree without modifying it
    Index(IndexArgs),
    /// Remove known and repeated files listed in an index
    Prune(PruneArgs),
    /// Merge two indexed trees into one
    Merge(MergeArgs),
    /// Write the fingerprints of one or more trees as a known set
    Hashset(HashsetArgs),
}

/// Fingerprint worker options.
#[derive(Debug, Clone, Default, Args)]
pub struct WorkerArgs {
    /// Fingerprint algorithm
    #[arg(long, value_enum)]
    pub mode: Option<FingerprintMode>,

    /// Number of I/O threads for fingerprinting
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Files fingerprinted per batch
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,
}

/// Directory walking options.
#[derive(Debug, Clone, Default, Args)]
pub struct WalkArgs {
    /// Follow symbolic links during the walk
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,
}

/// Known-set options.
#[derive(Debug, Clone, Default, Args)]
pub struct KnownArgs {
    /// File of known fingerprints (one hex digest per line)
    #[arg(long, value_name = "FILE")]
    pub known: Option<PathBuf>,

    /// In-memory store for the known set
    #[arg(long, value_enum, value_name = "BACKING", requires = "known")]
    pub known_backing: Option<KnownSetBacking>,
}

/// Arguments for the process subcommand.
#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Source trees, richest metadata first (TestDisk before PhotoRec)
    ///
    /// When two trees hold the same content, the copy from the earlier tree
    /// is kept and named after its path there. TestDisk output keeps the
    /// original folders and file names; PhotoRec output only has generated
    /// names, so it goes last.
    #[arg(value_name = "SRC", required = true)]
    pub sources: Vec<PathBuf>,

    /// Destination directory
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,

    #[command(flatten)]
    pub known: KnownArgs,

    /// File of category labels whose files are deleted after classification
    #[arg(long, value_name = "FILE")]
    pub blacklist: Option<PathBuf>,

    /// Images below this size are sorted into Small_Images (e.g. 50KB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub small_image_threshold: Option<u64>,

    /// Sort recognised content with an unmapped extension into Unsupported_Extension
    #[arg(long)]
    pub separate_unsupported_extensions: bool,

    /// Index file name inside the destination
    #[arg(long, value_name = "NAME")]
    pub index_name: Option<String>,

    /// Move discarded files to the system trash instead of deleting them
    #[arg(long)]
    pub trash: bool,

    #[command(flatten)]
    pub workers: WorkerArgs,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for the condense subcommand.
#[derive(Debug, Args)]
pub struct CondenseArgs {
    /// Tree to flatten
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for the index subcommand.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Tree to index
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Index file (default: <ROOT name>.index in the current directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub workers: WorkerArgs,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Arguments for the prune subcommand.
#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Index to prune
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    #[command(flatten)]
    pub known: KnownArgs,

    /// Move removed files to the system trash
    #[arg(long)]
    pub trash: bool,
}

/// Arguments for the merge subcommand.
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Primary tree; its files win over the secondary's
    #[arg(value_name = "PRIMARY")]
    pub primary: PathBuf,

    /// Index of the primary tree
    #[arg(value_name = "PRIMARY_INDEX")]
    pub primary_index: PathBuf,

    /// Secondary tree
    #[arg(value_name = "SECONDARY")]
    pub secondary: PathBuf,

    /// Index of the secondary tree
    #[arg(value_name = "SECONDARY_INDEX")]
    pub secondary_index: PathBuf,

    /// Destination directory
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,

    /// Index file name inside the destination
    #[arg(long, value_name = "NAME")]
    pub index_name: Option<String>,

    /// Move removed files to the system trash
    #[arg(long)]
    pub trash: bool,
}

/// Arguments for the hashset subcommand.
#[derive(Debug, Args)]
pub struct HashsetArgs {
    /// Trees to fingerprint
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Fingerprint file to write
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub workers: WorkerArgs,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB.
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use tombraider::cli::parse_size;
///
/// assert_eq!(parse_size("50000").unwrap(), 50_000);
/// assert_eq!(parse_size("50KB").unwrap(), 50_000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number or an
/// unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
