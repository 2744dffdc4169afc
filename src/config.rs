//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. Environment variables prefixed with `UPDIR_` (e.g. `UPDIR_DEEP=true`)
//! 4. Command-line flags, applied by the caller on top of the loaded value
//!
//! The merged [`Config`] is then validated into [`SyncOptions`], the explicit
//! value the snapshot builder and the sync actions take. Nothing in the core
//! reads configuration from global state.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::path_utils::path_key;
use crate::scanner::OPTIMAL_BUFFER_SIZE;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "UPDIR_";

/// Largest accepted hash buffer (1 GiB).
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;

/// Errors raised while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A configuration layer could not be parsed or extracted.
    #[error("Invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// The missing-file handling mode is not one of ask/report/ignore.
    #[error("Invalid missing-file handling mode: {0:?} (expected ask, report or ignore)")]
    InvalidMissingPolicy(String),

    /// The hash buffer must hold at least one byte.
    #[error("Hash buffer size must be greater than zero")]
    ZeroBufferSize,

    /// The hash buffer is allocated up front and must stay bounded.
    #[error("Hash buffer size {size} exceeds the maximum of {max} bytes")]
    BufferTooLarge {
        /// Requested size in bytes
        size: usize,
        /// Largest accepted size in bytes
        max: usize,
    },

    /// No platform directory could be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Writing the configuration file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// What to do with destination files that do not exist in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Ask before moving each one to the trash
    Ask,
    /// List them, change nothing
    #[default]
    Report,
    /// Say nothing
    Ignore,
}

impl fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Report => write!(f, "report"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for MissingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "report" => Ok(Self::Report),
            "ignore" => Ok(Self::Ignore),
            _ => Err(ConfigError::InvalidMissingPolicy(s.to_string())),
        }
    }
}

/// Persisted application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Handling of destination-only files.
    pub missing: MissingPolicy,
    /// Compare subdirectories too.
    pub deep: bool,
    /// Relative paths to leave out of both snapshots.
    pub exclude: Vec<String>,
    /// Report what would happen without touching the destination.
    pub simulate: bool,
    /// Read buffer size for hashing, in bytes.
    pub buffer_size: usize,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Where the hash cache lives. Defaults to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::Report,
            deep: false,
            exclude: Vec::new(),
            simulate: false,
            buffer_size: OPTIMAL_BUFFER_SIZE,
            follow_symlinks: false,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Build the figment stack: defaults, then `file` (or the default config
    /// file), then the environment.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match file.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => {
                log::debug!("Reading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => log::debug!("No configuration file location available"),
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the layered configuration.
    ///
    /// A missing file is not an error; a malformed one is.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a layer fails to parse.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(file).extract().map_err(|e| ConfigError::from(Box::new(e)))
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default platform-specific configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Cache directory to use: the configured one or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] if neither is available.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => project_dirs()
                .map(|dirs| dirs.cache_dir().join("dirs"))
                .ok_or(ConfigError::NoProjectDirs),
        }
    }

    /// Validate into the options the core operates on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroBufferSize`] for a zero buffer and
    /// [`ConfigError::BufferTooLarge`] above [`MAX_BUFFER_SIZE`].
    pub fn to_options(&self) -> Result<SyncOptions, ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::BufferTooLarge {
                size: self.buffer_size,
                max: MAX_BUFFER_SIZE,
            });
        }
        Ok(SyncOptions::default()
            .with_deep(self.deep)
            .with_follow_symlinks(self.follow_symlinks)
            .with_excluded(&self.exclude)
            .with_simulate(self.simulate)
            .with_buffer_size(self.buffer_size)
            .with_missing(self.missing))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "updir", "updir")
}

/// Options for one sync run, passed explicitly to every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Walk subdirectories.
    pub deep: bool,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Normalized relative-path keys to skip.
    pub excluded: HashSet<String>,
    /// Log actions instead of performing them.
    pub simulate: bool,
    /// Hash read buffer size in bytes.
    pub buffer_size: usize,
    /// Handling of destination-only files.
    pub missing: MissingPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            deep: false,
            follow_symlinks: false,
            excluded: HashSet::new(),
            simulate: false,
            buffer_size: OPTIMAL_BUFFER_SIZE,
            missing: MissingPolicy::Report,
        }
    }
}

impl SyncOptions {
    /// Set deep (recursive) traversal.
    #[must_use]
    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Set symlink following.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Replace the exclusion set. Paths are normalized with [`path_key`].
    #[must_use]
    pub fn with_excluded<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = paths
            .into_iter()
            .map(|p| path_key(p.as_ref().trim()))
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    /// Set simulate mode.
    #[must_use]
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Set the hash buffer size, clamped to `1..=MAX_BUFFER_SIZE`.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.clamp(1, MAX_BUFFER_SIZE);
        self
    }

    /// Set the missing-file policy.
    #[must_use]
    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Whether a normalized relative-path key is excluded.
    #[must_use]
    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
    }
}
