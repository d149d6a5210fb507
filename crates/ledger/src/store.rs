use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::NamedTempFile;
use tonika_domain::SongEntry;
use tracing::{debug, warn};

use crate::error::LedgerError;

pub const DEFAULT_LEDGER_FILE: &str = "chords_db.json";

/// Persisted, append-only collection of song analyses.
///
/// `load` never fails on missing or corrupt content: both read as an empty
/// ledger, and the next `persist` replaces whatever was there. `append`
/// performs load, push and persist as one step with respect to other
/// appends on the same store value.
pub trait LedgerStore {
    fn load(&self) -> Result<Vec<SongEntry>, LedgerError>;
    fn persist(&self, entries: &[SongEntry]) -> Result<(), LedgerError>;

    fn append(&self, entry: SongEntry) -> Result<Vec<SongEntry>, LedgerError> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.persist(&entries)?;
        Ok(entries)
    }
}

fn check_finite(entries: &[SongEntry]) -> Result<(), LedgerError> {
    for entry in entries {
        if let Some(field) = entry.non_finite_field() {
            return Err(LedgerError::NonFinite {
                artist: entry.artist.clone(),
                title: entry.title.clone(),
                field,
            });
        }
    }
    Ok(())
}

/// Ledger kept as one pretty-printed JSON array on disk.
pub struct JsonFileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Writes next to the ledger and renames over it; the temp file is
    /// removed on any failure.
    fn write_all(&self, entries: &[SongEntry]) -> Result<(), LedgerError> {
        check_finite(entries)?;
        let json = serde_json::to_string_pretty(entries)?;
        let directory = self.directory();
        let mut temp =
            NamedTempFile::new_in(directory).map_err(|err| LedgerError::io(directory, err))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| LedgerError::io(&self.path, err))?;
        temp.persist(&self.path)
            .map_err(|err| LedgerError::io(&self.path, err.error))?;
        debug!(path = ?self.path, entries = entries.len(), "ledger persisted");
        Ok(())
    }
}

impl LedgerStore for JsonFileLedger {
    fn load(&self) -> Result<Vec<SongEntry>, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                warn!(path = ?self.path, "ledger is not valid UTF-8, starting from an empty ledger");
                return Ok(Vec::new());
            }
            Err(err) => return Err(LedgerError::io(&self.path, err)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(
                    path = ?self.path,
                    error = %err,
                    "ledger is corrupt, starting from an empty ledger; it will be overwritten on the next write"
                );
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, entries: &[SongEntry]) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.write_all(entries)
    }

    fn append(&self, entry: SongEntry) -> Result<Vec<SongEntry>, LedgerError> {
        let _guard = self.lock();
        let mut entries = self.load()?;
        entries.push(entry);
        self.write_all(&entries)?;
        Ok(entries)
    }
}

/// Ledger that lives only as long as the value; used for dry runs.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<SongEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<SongEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerStore for InMemoryLedger {
    fn load(&self) -> Result<Vec<SongEntry>, LedgerError> {
        Ok(self.entries().clone())
    }

    fn persist(&self, entries: &[SongEntry]) -> Result<(), LedgerError> {
        check_finite(entries)?;
        *self.entries() = entries.to_vec();
        Ok(())
    }

    fn append(&self, entry: SongEntry) -> Result<Vec<SongEntry>, LedgerError> {
        check_finite(std::slice::from_ref(&entry))?;
        let mut entries = self.entries();
        entries.push(entry);
        Ok(entries.clone())
    }
}
