//! Invocation ledger
//!
//! Append-only record of fingerprints that already fired. The file format is
//! one fingerprint per line, UTF-8, no header:
//!
//! ```text
//! tests/login.rs-LoginTest-test_login-Page-click-42
//! tests/login.rs-LoginTest-test_login-Page-click-50
//! ```
//!
//! Membership is an exact line match including the `\n` terminator. A
//! missing file is an empty ledger. Lines are never removed or rewritten;
//! the only destructive operation is [`FileLedger::reset`], which deletes
//! the whole file.
//!
//! # Single writer
//!
//! [`FileLedger::claim`] holds an in-process mutex and an exclusive advisory
//! lock (`flock(LOCK_EX)` via `fs2`) across the membership check and the
//! append, so cooperating threads and processes see at-most-once. Writers
//! that append to the file without the lock are not protected.

use crate::config::expand_home;
use crate::fingerprint::Fingerprint;
use fs2::FileExt;
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to lock ledger {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove ledger {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Durable set of consumed fingerprints
pub trait InvocationLedger: Send + Sync + fmt::Debug {
    /// True if `fingerprint` was recorded before
    fn has_recorded(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Record `fingerprint` unless present; true iff this call recorded it
    fn claim(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Record `fingerprint`; recording a present fingerprint is a no-op
    fn record(&self, fingerprint: &Fingerprint) -> Result<()> {
        self.claim(fingerprint).map(|_| ())
    }

    /// All parseable entries in recording order
    fn entries(&self) -> Result<Vec<Fingerprint>>;
}

/// Ledger backed by a plain text file
pub struct FileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl fmt::Debug for FileLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileLedger {
    /// Ledger at `path`; a leading `~` is expanded. The file is created on
    /// first append.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: expand_home(path),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw ledger lines, terminators included
    pub fn lines(&self) -> Result<Vec<String>> {
        Ok(split_lines(&self.read_shared()?))
    }

    /// Delete the ledger file; returns whether one existed
    pub fn reset(&self) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Removed ledger {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LedgerError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn read_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn lock_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Lock {
            path: self.path.clone(),
            source,
        }
    }

    fn append_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Append {
            path: self.path.clone(),
            source,
        }
    }

    /// Whole file under a shared lock; a missing file reads as empty
    fn read_shared(&self) -> Result<String> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(self.read_err(e)),
        };

        FileExt::lock_shared(&file).map_err(|e| self.lock_err(e))?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content);
        self.unlock(&file);
        read.map_err(|e| self.read_err(e))?;

        Ok(content)
    }

    /// Membership check and append; caller holds the exclusive lock
    fn append_if_absent(&self, file: &mut File, wanted: &str) -> Result<bool> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.read_err(e))?;
        if content.split_inclusive('\n').any(|line| line == wanted) {
            return Ok(false);
        }

        // A truncated last line must not swallow the new entry
        let separator = if content.is_empty() || content.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        file.write_all(format!("{}{}", separator, wanted).as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| self.append_err(e))?;
        Ok(true)
    }

    /// Closing the handle releases the lock anyway
    fn unlock(&self, file: &File) {
        if let Err(e) = FileExt::unlock(file) {
            tracing::debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }

    fn open_for_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.append_err(e))?;
        }

        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.append_err(e))
    }
}

impl InvocationLedger for FileLedger {
    fn has_recorded(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let wanted = fingerprint.to_line();
        let content = self.read_shared()?;
        Ok(content.split_inclusive('\n').any(|line| line == wanted))
    }

    fn claim(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let wanted = fingerprint.to_line();
        let _guard = self.write_lock.lock();

        let mut file = self.open_for_append()?;
        FileExt::lock_exclusive(&file).map_err(|e| self.lock_err(e))?;

        let outcome = self.append_if_absent(&mut file, &wanted);
        self.unlock(&file);

        if let Ok(recorded) = &outcome {
            tracing::debug!(
                "Ledger {} {}: {}",
                self.path.display(),
                if *recorded { "recorded" } else { "already has" },
                fingerprint
            );
        }
        outcome
    }

    fn entries(&self) -> Result<Vec<Fingerprint>> {
        Ok(parse_entries(&self.lines()?))
    }
}

/// In-memory ledger for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryLedger {
    lines: Mutex<IndexSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl InvocationLedger for MemoryLedger {
    fn has_recorded(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.lines.lock().contains(&fingerprint.to_line()))
    }

    fn claim(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.lines.lock().insert(fingerprint.to_line()))
    }

    fn entries(&self) -> Result<Vec<Fingerprint>> {
        let lines: Vec<String> = self.lines.lock().iter().cloned().collect();
        Ok(parse_entries(&lines))
    }
}

fn split_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

fn parse_entries(lines: &[String]) -> Vec<Fingerprint> {
    lines
        .iter()
        .filter_map(|line| {
            let parsed = Fingerprint::parse(line);
            if parsed.is_none() {
                tracing::warn!("Skipping unparseable ledger line: {:?}", line);
            }
            parsed
        })
        .collect()
}
