//! updir - content-based directory updater
//!
//! updir brings a destination directory tree in line with a source tree by
//! comparing file contents (xxHash64) rather than timestamps. Hashes are
//! cached on disk per directory so that unchanged files are never read twice.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod snapshot;

use std::fs;
use std::io::{self, Write};

use anyhow::Context;

use crate::actions::{AlwaysAnswer, Confirm, DeleteMode, DialoguerConfirm, SyncPlan};
use crate::cache::DirectoryCache;
use crate::cli::{CacheArgs, CacheCommand, Cli, Commands, OutputFormat, SyncArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::{JsonReport, TextReport};
use crate::progress::{LogProgress, Progress, ProgressCallback};
use crate::scanner::path_utils::directory_key;
use crate::snapshot::SnapshotBuilder;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns the first error of the command; use [`ExitCode::for_error`] to map
/// it to an exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())
        .context("Failed to open log file")?;

    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    log::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Sync(ref args) => run_sync(args, config, cli.verbose, cli.quiet),
        Commands::Cache(ref args) => run_cache(args, config),
    }
}

fn run_sync(args: &SyncArgs, config: Config, verbose: u8, quiet: bool) -> anyhow::Result<ExitCode> {
    let config = args.apply_to(config);
    let options = config.to_options()?;
    let handler = signal::install_handler()?;

    let cache = if args.no_cache {
        None
    } else {
        let dir = config.resolve_cache_dir()?;
        Some(
            DirectoryCache::open(&dir)
                .with_context(|| format!("Failed to open hash cache at {}", dir.display()))?,
        )
    };

    // No progress bar under JSON output, only debug log lines.
    let progress: Box<dyn ProgressCallback> = match args.output {
        OutputFormat::Json => Box::new(LogProgress),
        OutputFormat::Text => Box::new(Progress::new(quiet)),
    };
    let builder = match cache {
        Some(ref cache) => SnapshotBuilder::new(cache, &options),
        None => SnapshotBuilder::without_cache(&options),
    }
    .with_progress(progress.as_ref())
    .with_shutdown_flag(handler.get_flag());

    let comparison = compare::compare_with(&builder, &args.source, &args.destination)?;

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AlwaysAnswer(true))
    } else {
        Box::new(DialoguerConfirm)
    };
    let delete_mode = if args.permanent {
        DeleteMode::Permanent
    } else {
        DeleteMode::Trash
    };
    let summary = SyncPlan::new(&args.source, &args.destination, &options, confirm.as_ref())
        .with_delete_mode(delete_mode)
        .with_shutdown_flag(handler.get_flag())
        .apply(&comparison.comparisons)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Json => {
            JsonReport::new(
                &args.source,
                &args.destination,
                &comparison.comparisons,
                ExitCode::Success,
            )
            .with_stats(comparison.source_stats, comparison.destination_stats)
            .with_sync_summary(summary)
            .write_to(&mut out, true)?;
        }
        OutputFormat::Text if !quiet => {
            TextReport::new(&comparison.comparisons)
                .with_matches(verbose > 0)
                .with_sync_summary(summary)
                .write_to(&mut out)?;
        }
        OutputFormat::Text => {}
    }
    out.flush()?;

    Ok(ExitCode::Success)
}

fn run_cache(args: &CacheArgs, mut config: Config) -> anyhow::Result<ExitCode> {
    if let Some(ref dir) = args.cache {
        config.cache_dir = Some(dir.clone());
    }
    let dir = config.resolve_cache_dir()?;
    let cache = DirectoryCache::open(&dir)
        .with_context(|| format!("Failed to open hash cache at {}", dir.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.action {
        CacheCommand::List => {
            for key in cache.keys()? {
                writeln!(out, "{key}")?;
            }
        }
        CacheCommand::Count => {
            writeln!(out, "{}", cache.count())?;
        }
        CacheCommand::Forget { ref dir } => {
            let absolute = fs::canonicalize(dir).or_else(|_| std::path::absolute(dir))?;
            let key = directory_key(&absolute);
            if cache.remove(&key)? {
                log::info!("Forgot {}", absolute.display());
            } else {
                log::warn!("No cached snapshot for {}", absolute.display());
            }
        }
        CacheCommand::Clear => {
            cache.clear()?;
            log::info!("Cleared hash cache at {}", dir.display());
        }
    }

    Ok(ExitCode::Success)
}
