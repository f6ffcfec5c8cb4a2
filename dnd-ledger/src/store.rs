//! Ledger storage.
//!
//! A store keeps one versioned ledger per incarnation. Writes are
//! conditional: `save` names the version it read, and fails with
//! [`StoreError::VersionConflict`] if another writer got there first. That
//! makes every load, compute, save cycle serializable per incarnation without
//! holding a lock across the computation.

use crate::ledger::{IncarnationId, ResourceLedger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

/// Errors from ledger storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Version conflict on {id}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        id: IncarnationId,
        expected: Option<u64>,
        found: Option<u64>,
    },
}

/// A stored ledger and the write version it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedLedger {
    pub version: u64,
    pub ledger: ResourceLedger,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self, id: IncarnationId) -> Result<Option<VersionedLedger>, StoreError>;

    /// Store `ledger` if the current version equals `expected_version`
    /// (`None` meaning "no ledger yet"). Returns the new version.
    async fn save(
        &self,
        id: IncarnationId,
        ledger: &ResourceLedger,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Remove a ledger. Returns whether one existed.
    async fn delete(&self, id: IncarnationId) -> Result<bool, StoreError>;
}

fn check_version(
    id: IncarnationId,
    expected: Option<u64>,
    found: Option<u64>,
) -> Result<u64, StoreError> {
    if expected != found {
        return Err(StoreError::VersionConflict {
            id,
            expected,
            found,
        });
    }
    Ok(found.map_or(1, |v| v + 1))
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledgers: RwLock<HashMap<IncarnationId, VersionedLedger>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.ledgers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ledgers.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load(&self, id: IncarnationId) -> Result<Option<VersionedLedger>, StoreError> {
        Ok(self.ledgers.read().await.get(&id).cloned())
    }

    async fn save(
        &self,
        id: IncarnationId,
        ledger: &ResourceLedger,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let found = ledgers.get(&id).map(|stored| stored.version);
        let version = check_version(id, expected_version, found)?;
        ledgers.insert(
            id,
            VersionedLedger {
                version,
                ledger: ledger.clone(),
            },
        );
        Ok(version)
    }

    async fn delete(&self, id: IncarnationId) -> Result<bool, StoreError> {
        Ok(self.ledgers.write().await.remove(&id).is_some())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Current ledger file format version.
pub const FILE_FORMAT_VERSION: u32 = 1;

/// On-disk shape of one ledger file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    format_version: u32,
    incarnation_id: IncarnationId,
    version: u64,
    ledger: ResourceLedger,
}

/// One pretty-printed JSON file per incarnation, `<dir>/<id>.json`.
///
/// Writes go through a temporary file and a rename, so a reader never sees a
/// partial ledger. Conditional writes are serialized by an in-process lock;
/// the store assumes it is the only writer to its directory.
#[derive(Debug)]
pub struct JsonFileLedgerStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileLedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the directory if needed and open a store over it.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir).await?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: IncarnationId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_file(&self, id: IncarnationId) -> Result<Option<LedgerFile>, StoreError> {
        let content = match fs::read_to_string(self.path_for(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: LedgerFile = serde_json::from_str(&content)?;

        if file.format_version != FILE_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: FILE_FORMAT_VERSION,
                found: file.format_version,
            });
        }

        Ok(Some(file))
    }
}

#[async_trait]
impl LedgerStore for JsonFileLedgerStore {
    async fn load(&self, id: IncarnationId) -> Result<Option<VersionedLedger>, StoreError> {
        Ok(self.read_file(id).await?.map(|file| VersionedLedger {
            version: file.version,
            ledger: file.ledger,
        }))
    }

    async fn save(
        &self,
        id: IncarnationId,
        ledger: &ResourceLedger,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;

        let found = self.read_file(id).await?.map(|file| file.version);
        let version = check_version(id, expected_version, found)?;

        let file = LedgerFile {
            format_version: FILE_FORMAT_VERSION,
            incarnation_id: id,
            version,
            ledger: ledger.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(version)
    }

    async fn delete(&self, id: IncarnationId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
