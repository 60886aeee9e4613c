//! Persisted record of notifications already sent.
//!
//! The ledger maps a bar date to the crossover kind that was dispatched for
//! it. A run consults it before dispatching and records into it afterwards,
//! so re-running against the same window never notifies twice.
//!
//! Every `record` writes the whole mapping through to its [`LedgerStore`]
//! (full overwrite, no append log). [`JsonFileStore`] replaces the file
//! atomically via a temp file in the same directory. Two processes sharing a
//! ledger file would still race between load and save, so a run holds a
//! [`LedgerLock`] for its whole duration.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::signal::CrossoverKind;
use crate::UtcDateTime;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger at {} cannot be parsed: {source}", .path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger at {} cannot be read or written: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger at {} is in use by another run (lock file {})", .path.display(), .lock.display())]
    Locked { path: PathBuf, lock: PathBuf },
}

/// In-memory view of the ledger: one kind per bar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertLedger {
    entries: BTreeMap<UtcDateTime, CrossoverKind>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True only if exactly this kind was recorded for `date`.
    pub fn was_sent(&self, date: UtcDateTime, kind: CrossoverKind) -> bool {
        self.entries.get(&date) == Some(&kind)
    }

    pub fn kind_for(&self, date: UtcDateTime) -> Option<CrossoverKind> {
        self.entries.get(&date).copied()
    }

    /// Sets `date -> kind` and writes the full mapping through to `store`.
    ///
    /// On a failed write the in-memory entry is rolled back so the ledger
    /// keeps matching what is on disk; the error is fatal for the run.
    pub fn record(
        &mut self,
        store: &dyn LedgerStore,
        date: UtcDateTime,
        kind: CrossoverKind,
    ) -> Result<(), LedgerError> {
        let previous = self.entries.insert(date, kind);

        if let Err(error) = store.save(self) {
            match previous {
                Some(kind) => self.entries.insert(date, kind),
                None => self.entries.remove(&date),
            };
            return Err(error);
        }

        debug!(%date, kind = kind.as_str(), "ledger entry recorded");
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (UtcDateTime, CrossoverKind)> + '_ {
        self.entries.iter().map(|(date, kind)| (*date, *kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Backing storage for the ledger.
pub trait LedgerStore: Send + Sync {
    /// Returns an empty ledger when nothing has been persisted yet.
    fn load(&self) -> Result<AlertLedger, LedgerError>;

    fn save(&self, ledger: &AlertLedger) -> Result<(), LedgerError>;
}

/// Pretty-printed JSON object `{"<RFC3339 date>": "<kind>"}` on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence(&self, source: io::Error) -> LedgerError {
        LedgerError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<AlertLedger, LedgerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file yet, starting empty");
                return Ok(AlertLedger::new());
            }
            Err(error) => return Err(self.persistence(error)),
        };

        serde_json::from_str(&raw).map_err(|source| LedgerError::CorruptState {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, ledger: &AlertLedger) -> Result<(), LedgerError> {
        let directory = parent_dir(&self.path);
        fs::create_dir_all(directory).map_err(|e| self.persistence(e))?;

        let mut staged = tempfile::NamedTempFile::new_in(directory).map_err(|e| self.persistence(e))?;
        serde_json::to_writer_pretty(staged.as_file_mut(), ledger)
            .map_err(|e| self.persistence(io::Error::from(e)))?;
        staged
            .as_file_mut()
            .write_all(b"\n")
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| self.persistence(e))?;

        staged
            .persist(&self.path)
            .map_err(|e| self.persistence(e.error))?;
        Ok(())
    }
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    ledger: AlertLedger,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: AlertLedger) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                ledger,
                ..MemoryState::default()
            }),
        }
    }

    /// Makes every subsequent `save` fail with a persistence error.
    pub fn fail_saves(&self) {
        self.lock().fail_saves = true;
    }

    pub fn snapshot(&self) -> AlertLedger {
        self.lock().ledger.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<AlertLedger, LedgerError> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &AlertLedger) -> Result<(), LedgerError> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(LedgerError::Persistence {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::Other, "memory store rejects writes"),
            });
        }
        state.ledger = ledger.clone();
        state.saves += 1;
        Ok(())
    }
}

/// Advisory lock on `<ledger>.lock`, held for the duration of a run.
///
/// The OS drops the lock when the holding process exits, however it exits,
/// so a killed run never blocks the next one. The lock file stays on disk.
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
    file: File,
}

impl LedgerLock {
    pub fn acquire(ledger_path: &Path) -> Result<Self, LedgerError> {
        let lock_path = lock_path_for(ledger_path);
        fs::create_dir_all(parent_dir(&lock_path)).map_err(|source| LedgerError::Persistence {
            path: ledger_path.to_path_buf(),
            source,
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| LedgerError::Persistence {
                path: lock_path.clone(),
                source,
            })?;

        if let Err(source) = FileExt::try_lock_exclusive(&file) {
            if source.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(LedgerError::Locked {
                    path: ledger_path.to_path_buf(),
                    lock: lock_path,
                });
            }
            return Err(LedgerError::Persistence {
                path: lock_path,
                source,
            });
        }

        debug!(lock = %lock_path.display(), "ledger lock acquired");
        Ok(Self {
            path: lock_path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %error, "failed to release ledger lock");
        }
    }
}

fn lock_path_for(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "ledger".into());
    name.push(".lock");
    ledger_path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
