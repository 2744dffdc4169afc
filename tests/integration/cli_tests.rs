use crate::clean_env;
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use updir::cache::DirectoryCache;
use updir::cli::{CacheCommand, Cli, Commands, OutputFormat};
use updir::config::{ConfigError, MissingPolicy};
use updir::error::ExitCode;

struct Workspace {
    source: TempDir,
    destination: TempDir,
    cache: TempDir,
    config: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            source: tempdir().unwrap(),
            destination: tempdir().unwrap(),
            cache: tempdir().unwrap(),
            config: tempdir().unwrap(),
        };
        fs::write(ws.source.path().join("a.txt"), b"same").unwrap();
        fs::write(ws.source.path().join("b.txt"), b"new").unwrap();
        fs::create_dir(ws.source.path().join("sub")).unwrap();
        fs::write(ws.source.path().join("sub/c.txt"), b"deep").unwrap();
        fs::write(ws.destination.path().join("a.txt"), b"same").unwrap();
        fs::write(ws.destination.path().join("d.txt"), b"only here").unwrap();
        ws
    }

    /// Run `updir sync SOURCE DEST <extra>` against this workspace.
    fn sync(&self, extra: &[&str]) -> anyhow::Result<ExitCode> {
        let mut args = vec![
            "updir".to_string(),
            "-q".to_string(),
            "--config".to_string(),
            path_arg(&self.config.path().join("absent.toml")),
            "sync".to_string(),
            path_arg(self.source.path()),
            path_arg(self.destination.path()),
            "--cache".to_string(),
            path_arg(self.cache.path()),
            "--permanent".to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        updir::run_app(Cli::try_parse_from(args).unwrap())
    }

    fn cache(&self, action: &[&str]) -> anyhow::Result<ExitCode> {
        let mut args = vec![
            "updir".to_string(),
            "-q".to_string(),
            "--config".to_string(),
            path_arg(&self.config.path().join("absent.toml")),
            "cache".to_string(),
            "--cache".to_string(),
            path_arg(self.cache.path()),
        ];
        args.extend(action.iter().map(|s| s.to_string()));
        updir::run_app(Cli::try_parse_from(args).unwrap())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_parse_sync_flags() {
    let cli = Cli::try_parse_from([
        "updir",
        "-vv",
        "sync",
        "src",
        "dst",
        "--missing",
        "ask",
        "-d",
        "-e",
        "Thumbs.db,desktop.ini",
        "--dry-run",
        "--buffer-size",
        "64KiB",
        "-o",
        "json",
        "-y",
    ])
    .unwrap();

    assert_eq!(cli.verbose, 2);
    let Commands::Sync(args) = cli.command else {
        panic!("expected sync");
    };
    assert_eq!(args.missing, Some(MissingPolicy::Ask));
    assert!(args.deep);
    assert_eq!(args.exclude, vec!["Thumbs.db", "desktop.ini"]);
    assert!(args.simulate);
    assert_eq!(args.buffer_size, Some(65_536));
    assert_eq!(args.output, OutputFormat::Json);
    assert!(args.yes);
    assert!(!args.permanent);
}

#[test]
fn test_parse_rejects_bad_values() {
    assert!(Cli::try_parse_from(["updir", "sync", "a", "b", "--missing", "delete"]).is_err());
    assert!(Cli::try_parse_from(["updir", "sync", "a"]).is_err());
    assert!(Cli::try_parse_from(["updir", "-q", "-v", "sync", "a", "b"]).is_err());
    assert!(
        Cli::try_parse_from(["updir", "sync", "a", "b", "--cache", "c", "--no-cache"]).is_err()
    );
}

#[test]
fn test_parse_cache_subcommands() {
    let cli = Cli::try_parse_from(["updir", "cache", "forget", "/music"]).unwrap();
    let Commands::Cache(args) = cli.command else {
        panic!("expected cache");
    };
    assert_eq!(
        args.action,
        CacheCommand::Forget {
            dir: "/music".into()
        }
    );

    let cli = Cli::try_parse_from(["updir", "cache", "count", "--cache", "/tmp/c"]).unwrap();
    let Commands::Cache(args) = cli.command else {
        panic!("expected cache");
    };
    assert_eq!(args.action, CacheCommand::Count);
    assert_eq!(args.cache, Some("/tmp/c".into()));
}

#[test]
fn test_sync_updates_destination() {
    let _env = clean_env();
    let ws = Workspace::new();

    let code = ws.sync(&["--deep"]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(fs::read(ws.destination.path().join("b.txt")).unwrap(), b"new");
    assert_eq!(
        fs::read(ws.destination.path().join("sub/c.txt")).unwrap(),
        b"deep"
    );
    assert!(ws.destination.path().join("d.txt").exists());
    assert_eq!(DirectoryCache::open(ws.cache.path()).unwrap().count(), 2);
}

#[test]
fn test_shallow_sync_skips_subdirectories() {
    let _env = clean_env();
    let ws = Workspace::new();

    ws.sync(&[]).unwrap();

    assert!(ws.destination.path().join("b.txt").exists());
    assert!(!ws.destination.path().join("sub").exists());
}

#[test]
fn test_simulate_changes_nothing() {
    let _env = clean_env();
    let ws = Workspace::new();

    let code = ws.sync(&["--simulate", "--deep", "--missing", "ask"]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(!ws.destination.path().join("b.txt").exists());
    assert!(ws.destination.path().join("d.txt").exists());
}

#[test]
fn test_missing_ask_with_yes_deletes() {
    let _env = clean_env();
    let ws = Workspace::new();

    ws.sync(&["--missing", "ask", "--yes"]).unwrap();

    assert!(!ws.destination.path().join("d.txt").exists());
}

#[test]
fn test_excluded_file_is_not_copied() {
    let _env = clean_env();
    let ws = Workspace::new();

    ws.sync(&["--exclude", "B.TXT"]).unwrap();

    assert!(!ws.destination.path().join("b.txt").exists());
}

#[test]
fn test_json_output_succeeds() {
    let _env = clean_env();
    let ws = Workspace::new();

    let code = ws.sync(&["--output", "json", "--simulate"]).unwrap();

    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_invalid_source_maps_to_invalid_input() {
    let _env = clean_env();
    let ws = Workspace::new();
    let missing = path_arg(&ws.source.path().join("absent"));
    let cli = Cli::try_parse_from([
        "updir",
        "-q",
        "--config",
        &path_arg(&ws.config.path().join("absent.toml")),
        "sync",
        &missing,
        &path_arg(ws.destination.path()),
        "--no-cache",
    ])
    .unwrap();

    let err = updir::run_app(cli).unwrap_err();

    assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidInput);
}

#[test]
fn test_no_cache_leaves_cache_empty() {
    let _env = clean_env();
    let ws = Workspace::new();
    let cli = Cli::try_parse_from([
        "updir",
        "-q",
        "--config",
        &path_arg(&ws.config.path().join("absent.toml")),
        "sync",
        &path_arg(ws.source.path()),
        &path_arg(ws.destination.path()),
        "--no-cache",
        "--simulate",
    ])
    .unwrap();

    updir::run_app(cli).unwrap();

    assert_eq!(DirectoryCache::open(ws.cache.path()).unwrap().count(), 0);
}

#[test]
fn test_cache_forget_and_clear() {
    let _env = clean_env();
    let ws = Workspace::new();
    ws.sync(&["--simulate"]).unwrap();
    assert_eq!(DirectoryCache::open(ws.cache.path()).unwrap().count(), 2);

    ws.cache(&["forget", &path_arg(ws.source.path())]).unwrap();
    assert_eq!(DirectoryCache::open(ws.cache.path()).unwrap().count(), 1);

    assert_eq!(ws.cache(&["list"]).unwrap(), ExitCode::Success);
    ws.cache(&["clear"]).unwrap();
    assert_eq!(DirectoryCache::open(ws.cache.path()).unwrap().count(), 0);
}

#[test]
fn test_config_file_sets_policy() {
    let _env = clean_env();
    let ws = Workspace::new();
    let config_path = ws.config.path().join("absent.toml");
    fs::write(&config_path, "missing = \"ask\"\ndeep = true\n").unwrap();

    ws.sync(&["--yes"]).unwrap();

    assert!(!ws.destination.path().join("d.txt").exists());
    assert!(ws.destination.path().join("sub/c.txt").exists());
}

#[test]
fn test_no_deep_overrides_config_file() {
    let _env = clean_env();
    let ws = Workspace::new();
    let config_path = ws.config.path().join("absent.toml");
    fs::write(&config_path, "deep = true\n").unwrap();

    ws.sync(&["--no-deep"]).unwrap();

    assert!(ws.destination.path().join("b.txt").exists());
    assert!(!ws.destination.path().join("sub").exists());
}

#[test]
fn test_oversized_buffer_is_invalid_input() {
    let _env = clean_env();
    let ws = Workspace::new();

    let err = ws.sync(&["--buffer-size", "2GiB"]).unwrap_err();

    assert!(err
        .chain()
        .any(|c| matches!(c.downcast_ref::<ConfigError>(), Some(ConfigError::BufferTooLarge { .. }))));
    assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidInput);
    assert!(!ws.destination.path().join("b.txt").exists());
}

