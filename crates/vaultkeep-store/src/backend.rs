//! The seam between [`crate::VaultStore`] and a concrete persistence engine.
//!
//! Backends deal only in the persisted layout: the list of occupied
//! `(slot, item)` pairs for one key.  Synthesizing empty records, slot-count
//! enforcement and the closed state all live in the store.

use async_trait::async_trait;
use vaultkeep_core::{SlotEntry, VaultKey};

use crate::error::StoreResult;

#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Short backend name for logs ("sqlite", "file", ...).
    fn kind(&self) -> &'static str;

    /// Persisted entries for `key`, or `None` if it was never saved.
    async fn load(&self, key: &VaultKey) -> StoreResult<Option<Vec<SlotEntry>>>;

    /// Overwrite everything stored for `key`.
    async fn save(&self, key: &VaultKey, entries: &[SlotEntry]) -> StoreResult<()>;

    /// Release resources. Called at most once.
    ///
    /// A write acknowledged by [`save`](Self::save) must already be on disk;
    /// backends that buffer anything flush it here.
    async fn close(&self) -> StoreResult<()>;
}
