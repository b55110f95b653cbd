//! Configuration for runledger
//!
//! Two values drive the ledger: where the ledger file lives and which prefix
//! marks the caller's own test modules when extracting the caller class.
//!
//! # Example runledger.toml
//!
//! ```toml
//! ledger_file = "~/.runledger/ledger.log"
//! caller_prefix = "test_"
//! ```
//!
//! Environment variables override the file: `RUNLEDGER_FILE` and
//! `RUNLEDGER_CALLER_PREFIX`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default ledger location
pub const DEFAULT_LEDGER_FILE: &str = "~/.runledger/ledger.log";

/// Default caller module prefix
pub const DEFAULT_CALLER_PREFIX: &str = "test_";

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "runledger.toml";

pub const LEDGER_FILE_ENV: &str = "RUNLEDGER_FILE";
pub const CALLER_PREFIX_ENV: &str = "RUNLEDGER_CALLER_PREFIX";

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid runledger config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid caller prefix pattern: {0}")]
    CallerPattern(#[from] regex::Error),
}

/// Ledger settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Ledger file path, `~` is expanded to the home directory
    pub ledger_file: String,

    /// Prefix of the caller's test module names
    pub caller_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
            caller_prefix: DEFAULT_CALLER_PREFIX.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve settings the way the CLI and `Tracer::from_env` do
    ///
    /// An explicit `path` must exist. Without one, `runledger.toml` in the
    /// working directory is used when present, defaults otherwise.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        Ok(settings.with_env_overrides())
    }

    /// Apply `RUNLEDGER_FILE` / `RUNLEDGER_CALLER_PREFIX`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(file) = env::var(LEDGER_FILE_ENV) {
            if !file.is_empty() {
                self.ledger_file = file;
            }
        }
        if let Ok(prefix) = env::var(CALLER_PREFIX_ENV) {
            self.caller_prefix = prefix;
        }
        self
    }

    /// Ledger path with the home directory expanded
    pub fn ledger_path(&self) -> PathBuf {
        expand_home(&self.ledger_file)
    }
}

/// Expand a leading `~` to `$HOME`
///
/// Paths without a leading `~`, or with no `HOME` set, are returned as is.
pub fn expand_home<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
