//! # Config — Engine Options
//!
//! The option struct supplied to [`engine::Engine::new`](../engine/struct.Engine.html#method.new).
//! This crate is the sole collaborator responsible for producing a validated
//! [`Options`] value; the engine itself never reads the environment or a
//! config file directly.
//!
//! ## Options
//!
//! | Field | Meaning |
//! |---|---|
//! | `path` | Filesystem directory holding the manifest and table files. |
//! | `memtable_size` | Byte capacity of each memtable. |
//! | `no_of_l0_files` | L0 count threshold that activates compaction. |
//! | `max_l1_size` | Byte ceiling above which an L1 table is split. |
//!
//! Construct via [`Options::builder`] or [`Options::from_env`]. Both paths
//! funnel through [`Options::validate`], which is the one place the
//! "configuration error (bad path)" class named in the design surfaces.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default byte capacity of a memtable before it is swapped to immutable (4 MiB).
pub const DEFAULT_MEMTABLE_SIZE: usize = 4 * 1024 * 1024;
/// Default number of L0 tables that triggers compaction.
pub const DEFAULT_NO_OF_L0_FILES: usize = 4;
/// Default byte ceiling above which an L1 table is split (64 MiB).
pub const DEFAULT_MAX_L1_SIZE: usize = 64 * 1024 * 1024;

/// Errors produced while building or validating [`Options`].
///
/// This is the "configuration error" class named in the design: surfaced
/// from [`Options::validate`] (and transitively from `Engine::new`),
/// recoverable by the caller — it never aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `path` exists but is not a directory.
    #[error("configured path {0:?} exists but is not a directory")]
    PathNotADirectory(PathBuf),

    /// `path`'s parent directory does not exist, so it could never be created.
    #[error("configured path {0:?} has no creatable parent directory")]
    PathParentMissing(PathBuf),

    /// A size/threshold field was zero.
    #[error("{field} must be greater than zero")]
    ZeroField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// An environment variable held a value that failed to parse.
    #[error("environment variable {var} = {value:?} is not a valid {expected}")]
    InvalidEnvValue {
        /// The environment variable name.
        var: &'static str,
        /// The raw string value read from the environment.
        value: String,
        /// A human description of the expected type.
        expected: &'static str,
    },
}

/// Engine configuration, per spec.md §6's enumerated Options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Directory holding the manifest and `<id>.table` files.
    pub path: PathBuf,
    /// Byte capacity of each memtable (`memtablesize`).
    pub memtable_size: usize,
    /// L0 table count that activates compaction (`NoOfL0Files`).
    pub no_of_l0_files: usize,
    /// Byte ceiling above which an L1 table is split (`maxL1Size`).
    pub max_l1_size: usize,
}

impl Options {
    /// Starts building an [`Options`] for the given storage directory, with
    /// every other field at its default.
    pub fn builder<P: AsRef<Path>>(path: P) -> OptionsBuilder {
        OptionsBuilder {
            path: path.as_ref().to_path_buf(),
            memtable_size: DEFAULT_MEMTABLE_SIZE,
            no_of_l0_files: DEFAULT_NO_OF_L0_FILES,
            max_l1_size: DEFAULT_MAX_L1_SIZE,
        }
    }

    /// Builds options from environment variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `HASHKV_PATH` | `"data"` |
    /// | `HASHKV_MEMTABLE_SIZE` | [`DEFAULT_MEMTABLE_SIZE`] |
    /// | `HASHKV_L0_FILES` | [`DEFAULT_NO_OF_L0_FILES`] |
    /// | `HASHKV_MAX_L1_SIZE` | [`DEFAULT_MAX_L1_SIZE`] |
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvValue`] if a variable is set but does
    /// not parse, or any error [`Options::validate`] would return.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("HASHKV_PATH").unwrap_or_else(|_| "data".to_string());
        let mut builder = Options::builder(path);

        if let Ok(v) = std::env::var("HASHKV_MEMTABLE_SIZE") {
            builder.memtable_size = parse_env("HASHKV_MEMTABLE_SIZE", &v, "byte size")?;
        }
        if let Ok(v) = std::env::var("HASHKV_L0_FILES") {
            builder.no_of_l0_files = parse_env("HASHKV_L0_FILES", &v, "file count")?;
        }
        if let Ok(v) = std::env::var("HASHKV_MAX_L1_SIZE") {
            builder.max_l1_size = parse_env("HASHKV_MAX_L1_SIZE", &v, "byte size")?;
        }

        let opts = builder.build();
        opts.validate()?;
        Ok(opts)
    }

    /// Validates the configuration, surfacing the "configuration error (bad
    /// path)" class named in the design.
    ///
    /// Checks:
    /// - `path` either already exists as a directory, or its parent exists
    ///   (so `create_dir_all` at engine startup can succeed).
    /// - `memtable_size`, `no_of_l0_files`, `max_l1_size` are all non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.exists() && !self.path.is_dir() {
            return Err(ConfigError::PathNotADirectory(self.path.clone()));
        }
        if !self.path.exists() {
            let parent_ok = self
                .path
                .parent()
                .map(|p| p.as_os_str().is_empty() || p.exists())
                .unwrap_or(true);
            if !parent_ok {
                return Err(ConfigError::PathParentMissing(self.path.clone()));
            }
        }
        if self.memtable_size == 0 {
            return Err(ConfigError::ZeroField {
                field: "memtable_size",
            });
        }
        if self.no_of_l0_files == 0 {
            return Err(ConfigError::ZeroField {
                field: "no_of_l0_files",
            });
        }
        if self.max_l1_size == 0 {
            return Err(ConfigError::ZeroField {
                field: "max_l1_size",
            });
        }
        Ok(())
    }
}

fn parse_env(var: &'static str, value: &str, expected: &'static str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnvValue {
            var,
            value: value.to_string(),
            expected,
        })
}

/// Builder for [`Options`], allowing individual fields to be overridden
/// before the final, immutable `Options` is produced.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    path: PathBuf,
    memtable_size: usize,
    no_of_l0_files: usize,
    max_l1_size: usize,
}

impl OptionsBuilder {
    /// Overrides the memtable byte capacity.
    #[must_use]
    pub fn memtable_size(mut self, bytes: usize) -> Self {
        self.memtable_size = bytes;
        self
    }

    /// Overrides the L0 compaction trigger.
    #[must_use]
    pub fn no_of_l0_files(mut self, count: usize) -> Self {
        self.no_of_l0_files = count;
        self
    }

    /// Overrides the L1 split size ceiling.
    #[must_use]
    pub fn max_l1_size(mut self, bytes: usize) -> Self {
        self.max_l1_size = bytes;
        self
    }

    /// Finishes the builder into an [`Options`] value. Does **not** validate
    /// — call [`Options::validate`] (or go through [`Options::from_env`])
    /// before passing the result to `Engine::new`.
    #[must_use]
    pub fn build(self) -> Options {
        Options {
            path: self.path,
            memtable_size: self.memtable_size,
            no_of_l0_files: self.no_of_l0_files,
            max_l1_size: self.max_l1_size,
        }
    }
}
