//! [`VaultStore`]: durable `(owner, index) -> VaultRecord` mapping.
//!
//! The store owns the backend lifecycle.  Every load and save holds a shared
//! guard on the backend slot for the duration of the backend call, and
//! [`VaultStore::close`] takes the exclusive guard, so closing waits for
//! in-flight operations to finish before the backend is flushed and dropped.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use vaultkeep_core::{VaultKey, VaultRecord};

use crate::backend::VaultBackend;
use crate::config::{BackendKind, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::sqlite::SqliteBackend;

pub struct VaultStore {
    backend: RwLock<Option<Arc<dyn VaultBackend>>>,
    slot_count: usize,
}

impl VaultStore {
    /// Validate `config` and connect the configured backend.
    ///
    /// Malformed parameters fail with [`StoreError::Configuration`] before any
    /// I/O is attempted.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let backend: Arc<dyn VaultBackend> = match config.backend {
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(&config.path).await?),
            BackendKind::File => Arc::new(FileBackend::open(&config.path).await?),
        };

        info!(
            backend = %config.backend,
            path = %config.path.display(),
            slot_count = config.slot_count,
            "vault store opened"
        );
        Ok(Self::with_backend(backend, config.slot_count))
    }

    /// Wrap an already-connected backend.
    pub fn with_backend(backend: Arc<dyn VaultBackend>, slot_count: usize) -> Self {
        Self {
            backend: RwLock::new(Some(backend)),
            slot_count,
        }
    }

    /// Number of slots in every record this store produces.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Load the record for `key`, synthesizing an empty one if it was never
    /// saved.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn load_vault(&self, key: &VaultKey) -> StoreResult<VaultRecord> {
        let guard = self.backend.read().await;
        let backend = guard.as_deref().ok_or(StoreError::Closed)?;

        let Some(entries) = backend.load(key).await? else {
            debug!("no stored record, synthesizing empty vault");
            return Ok(VaultRecord::empty(key.clone(), self.slot_count));
        };

        let (record, dropped) = VaultRecord::from_entries(key.clone(), self.slot_count, entries);
        if !dropped.is_empty() {
            warn!(
                dropped = dropped.len(),
                slot_count = self.slot_count,
                "stored items beyond the configured slot count were skipped"
            );
        }
        debug!(occupied = record.occupied(), "vault loaded");
        Ok(record)
    }

    /// Persist the full contents of `record`, replacing whatever was stored.
    #[instrument(skip(self, record), fields(key = %record.key()))]
    pub async fn save_vault(&self, record: &VaultRecord) -> StoreResult<()> {
        let guard = self.backend.read().await;
        let backend = guard.as_deref().ok_or(StoreError::Closed)?;

        backend.save(record.key(), &record.entries()).await?;
        debug!(occupied = record.occupied(), "vault saved");
        Ok(())
    }

    /// Flush and release the backend.
    ///
    /// Waits for in-flight loads and saves.  A second call is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        let mut guard = self.backend.write().await;
        let Some(backend) = guard.take() else {
            debug!("vault store already closed");
            return Ok(());
        };
        backend.close().await?;
        info!(backend = backend.kind(), "vault store closed");
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.backend.read().await.is_none()
    }
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("slot_count", &self.slot_count)
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────
