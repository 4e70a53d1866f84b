//! Session persistence: the durable subset of the queue, across restarts.
//!
//! A store holds one snapshot (a single storage slot). Every save replaces
//! the previous snapshot; only completed and error items are ever written
//! and raw payloads never are.

use crate::error::SefinError;
use crate::item::ItemRecord;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Load/save contract for the session snapshot.
pub trait SessionStore: Send + Sync {
    /// The last saved snapshot, or empty when nothing was saved yet.
    fn load(&self) -> Result<Vec<ItemRecord>, SefinError>;

    /// Replace the snapshot.
    fn save(&self, records: &[ItemRecord]) -> Result<(), SefinError>;
}

/// Snapshot held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ItemRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_records(records: Vec<ItemRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn snapshot(&self) -> Vec<ItemRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Vec<ItemRecord>, SefinError> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|e| SefinError::Internal(format!("memory store poisoned: {e}")))
    }

    fn save(&self, records: &[ItemRecord]) -> Result<(), SefinError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| SefinError::Internal(format!("memory store poisoned: {e}")))?;
        *guard = records.to_vec();
        Ok(())
    }
}

/// Snapshot stored as a JSON array in one file.
///
/// Writes go to a temporary file in the same directory which then replaces
/// the target, so a crash mid-write leaves the previous snapshot intact.
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

    fn persistence(&self, detail: impl std::fmt::Display) -> SefinError {
        SefinError::Persistence {
            path: self.path.clone(),
            detail: detail.to_string(),
        }
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<ItemRecord>, SefinError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.persistence(e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<ItemRecord> =
            serde_json::from_str(&text).map_err(|e| self.persistence(e))?;
        debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn save(&self, records: &[ItemRecord]) -> Result<(), SefinError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.persistence(e))?;

        let json = serde_json::to_vec_pretty(records).map_err(|e| self.persistence(e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.persistence(e))?;
        tmp.write_all(&json).map_err(|e| self.persistence(e))?;
        tmp.flush().map_err(|e| self.persistence(e))?;
        tmp.persist(&self.path).map_err(|e| self.persistence(e.error))?;

        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}
