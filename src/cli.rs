//! Command-line interface definitions for updir.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! The CLI follows standard conventions with global options (verbosity, color) and
//! subcommands for different operations.
//!
//! # Example
//!
//! ```bash
//! # Mirror a music library onto a player, reporting files only on the player
//! updir sync ~/Music /mnt/player/Music --deep
//!
//! # See what would happen, as JSON
//! updir sync ~/Music /mnt/player/Music --simulate --output json
//!
//! # Ask before deleting destination files that are not in the source
//! updir sync ~/Music /mnt/player/Music --missing ask
//!
//! # Inspect the hash cache
//! updir cache list
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, MissingPolicy};

/// Update a directory tree from another by file content.
///
/// updir hashes both trees (reusing cached hashes for files whose size and
/// modification time are unchanged), copies new and changed files into the
/// destination, and reports or removes files only present in the destination.
#[derive(Debug, Parser)]
#[command(name = "updir")]
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

    /// Also write log records to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for updir.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Update DEST from SOURCE
    Sync(SyncArgs),
    /// Inspect or reset the hash cache
    Cache(CacheArgs),
}

/// Arguments for the sync subcommand.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Directory holding the up-to-date files
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory to update
    #[arg(value_name = "DEST")]
    pub destination: PathBuf,

    /// What to do with files that exist only in DEST
    #[arg(long, value_enum, value_name = "MODE")]
    pub missing: Option<MissingPolicy>,

    /// Compare subdirectories too
    #[arg(short, long, overrides_with = "no_deep")]
    pub deep: bool,

    /// Compare top-level files only, even if the configuration enables --deep
    #[arg(long, overrides_with = "deep")]
    pub no_deep: bool,

    /// Relative paths to leave alone on both sides (comma separated or repeated)
    #[arg(short, long, value_name = "PATH", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Show what would be done without changing DEST
    #[arg(short, long, visible_alias = "dry-run")]
    pub simulate: bool,

    /// Read buffer size for hashing (e.g., 64KiB, 4MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub buffer_size: Option<u64>,

    /// Follow symbolic links while walking
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Directory of the hash cache
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Hash every file and leave the cache alone
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Delete files permanently instead of moving them to the trash
    ///
    /// Warning: Files cannot be recovered after permanent deletion.
    #[arg(long)]
    pub permanent: bool,

    /// Answer yes to every deletion prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl SyncArgs {
    /// Layer the flags that were given on top of `config`.
    #[must_use]
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(missing) = self.missing {
            config.missing = missing;
        }
        if self.deep {
            config.deep = true;
        } else if self.no_deep {
            config.deep = false;
        }
        config.exclude.extend(self.exclude.iter().cloned());
        if self.simulate {
            config.simulate = true;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if self.follow_symlinks {
            config.follow_symlinks = true;
        }
        if let Some(ref dir) = self.cache {
            config.cache_dir = Some(dir.clone());
        }
        config
    }
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Directory of the hash cache
    #[arg(long, global = true, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Cache operation
    #[command(subcommand)]
    pub action: CacheCommand,
}

/// Cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CacheCommand {
    /// List the directories with a cached snapshot
    List,
    /// Print the number of cached directories
    Count,
    /// Drop the cached snapshot of one directory
    Forget {
        /// Directory whose snapshot to drop
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Drop every cached snapshot
    Clear,
}

/// Output format for sync results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON output for scripting
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
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use updir::cli::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("64KiB").unwrap(), 65_536);
/// assert_eq!(parse_size("4MiB").unwrap(), 4_194_304);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
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
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
