//! Ledger service: load, compute, conditional write, retry.
//!
//! The engine functions are pure; this is where they meet a [`LedgerStore`].
//! Every mutating call reads the current version, computes the next ledger,
//! and writes it back only if nobody else wrote in between. On conflict the
//! whole cycle runs again against the fresh ledger, so concurrent calls on
//! one incarnation never lose an update.

use crate::error::LedgerError;
use crate::init::{self, CharacterBuild};
use crate::ledger::{IncarnationId, ResourceLedger};
use crate::ops::{self, OperationOutcome, ResourceOperation};
use crate::rest::{self, LongRestRequest, RestOutcome, ShortRestRequest};
use crate::store::{JsonFileLedgerStore, LedgerStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable overriding [`ServiceConfig::max_write_attempts`].
pub const ENV_MAX_WRITE_ATTEMPTS: &str = "DND_LEDGER_MAX_WRITE_ATTEMPTS";

/// Environment variable setting [`ServiceConfig::data_dir`].
pub const ENV_DATA_DIR: &str = "DND_LEDGER_DATA_DIR";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No ledger for incarnation {0}")]
    NotFound(IncarnationId),

    #[error("Incarnation {0} already has a ledger")]
    AlreadyExists(IncarnationId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Gave up writing {id} after {attempts} conflicting attempts")]
    WriteContention { id: IncarnationId, attempts: u32 },

    #[error("No data directory configured (set DND_LEDGER_DATA_DIR)")]
    MissingDataDir,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// How many load-compute-save cycles to try before giving up.
    pub max_write_attempts: u32,

    /// Where a file-backed store keeps its ledgers.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self {
            max_write_attempts: 5,
            data_dir: None,
        }
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Defaults overridden by `DND_LEDGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();

        if let Some(raw) = lookup(ENV_MAX_WRITE_ATTEMPTS) {
            match raw.trim().parse::<u32>() {
                Ok(attempts) => config = config.with_max_write_attempts(attempts),
                Err(_) => warn!(
                    variable = ENV_MAX_WRITE_ATTEMPTS,
                    value = %raw,
                    "Ignoring non-numeric write attempt limit"
                ),
            }
        }

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config = config.with_data_dir(dir);
        }

        config
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct LedgerService<S: LedgerStore> {
    store: S,
    config: ServiceConfig,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ServiceConfig::new())
    }

    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Current ledger for an incarnation.
    pub async fn get(&self, id: IncarnationId) -> Result<ResourceLedger, ServiceError> {
        self.store
            .load(id)
            .await?
            .map(|stored| stored.ledger)
            .ok_or(ServiceError::NotFound(id))
    }

    /// Create the ledger for a newly activated incarnation.
    pub async fn initialize(
        &self,
        id: IncarnationId,
        build: &CharacterBuild,
    ) -> Result<ResourceLedger, ServiceError> {
        let ledger = init::initialize(build);
        match self.store.save(id, &ledger, None).await {
            Ok(_) => {
                debug!(%id, "Created ledger");
                Ok(ledger)
            }
            Err(StoreError::VersionConflict { .. }) => Err(ServiceError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Bring the ledger in line with a changed build.
    ///
    /// Rebuilds the pools when the change reshapes them; otherwise the stored
    /// ledger is returned untouched.
    pub async fn sync_build(
        &self,
        id: IncarnationId,
        previous: &CharacterBuild,
        next: &CharacterBuild,
    ) -> Result<ResourceLedger, ServiceError> {
        if !init::needs_reinitialization(previous, next) {
            return self.get(id).await;
        }
        self.update(id, |ledger| {
            let rebuilt = init::reinitialize(ledger, next);
            Ok((rebuilt.clone(), rebuilt))
        })
        .await
    }

    pub async fn apply(
        &self,
        id: IncarnationId,
        operation: &ResourceOperation,
    ) -> Result<OperationOutcome, ServiceError> {
        self.update(id, |ledger| {
            let outcome = ops::apply(ledger, operation)?;
            Ok((outcome.ledger.clone(), outcome))
        })
        .await
    }

    pub async fn short_rest(
        &self,
        id: IncarnationId,
        request: &ShortRestRequest,
    ) -> Result<RestOutcome, ServiceError> {
        self.update(id, |ledger| {
            let outcome = rest::short_rest(ledger, request);
            Ok((outcome.ledger.clone(), outcome))
        })
        .await
    }

    pub async fn long_rest(
        &self,
        id: IncarnationId,
        request: &LongRestRequest,
    ) -> Result<RestOutcome, ServiceError> {
        self.update(id, |ledger| {
            let outcome = rest::long_rest(ledger, request);
            Ok((outcome.ledger.clone(), outcome))
        })
        .await
    }

    /// Drop the ledger of an incarnation that has ended, returning its final state.
    pub async fn retire(&self, id: IncarnationId) -> Result<ResourceLedger, ServiceError> {
        let ledger = self.get(id).await?;
        if !self.store.delete(id).await? {
            return Err(ServiceError::NotFound(id));
        }
        debug!(%id, "Retired ledger");
        Ok(ledger)
    }

    async fn update<T, F>(&self, id: IncarnationId, mut compute: F) -> Result<T, ServiceError>
    where
        F: FnMut(&ResourceLedger) -> Result<(ResourceLedger, T), ServiceError>,
    {
        let attempts = self.config.max_write_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self
                .store
                .load(id)
                .await?
                .ok_or(ServiceError::NotFound(id))?;
            let (next, value) = compute(&current.ledger)?;

            match self.store.save(id, &next, Some(current.version)).await {
                Ok(_) => return Ok(value),
                Err(StoreError::VersionConflict { found, .. }) => {
                    warn!(
                        %id,
                        attempt,
                        read_version = current.version,
                        found_version = ?found,
                        "Ledger changed during update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServiceError::WriteContention { id, attempts })
    }
}

impl LedgerService<JsonFileLedgerStore> {
    /// A service over JSON files in `config.data_dir`, creating the directory
    /// if needed.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let dir = config.data_dir.clone().ok_or(ServiceError::MissingDataDir)?;
        let store = JsonFileLedgerStore::open(dir).await?;
        debug!(dir = %store.dir().display(), "Opened file-backed ledger service");
        Ok(Self::with_config(store, config))
    }
}
