//! [`VaultSession`]: exclusive handle on one checked-out vault.
//!
//! A session is the only writer for its key while it lives.  Closing it saves
//! the contents (when they changed) and returns the key to idle.  The save and
//! release run on a spawned task that is awaited, so cancelling the caller of
//! [`VaultSession::close`] does not leave the key checked out.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use vaultkeep_core::{ItemDescriptor, VaultKey, VaultRecord};
use vaultkeep_store::StoreError;

use crate::coordinator::Shared;
use crate::error::{AccessError, Result};

/// Default display name for an open vault.
pub const DEFAULT_NAME_FORMAT: &str = "{PLAYER}'s Vault #{NUMBER}";

pub struct VaultSession {
    shared: Arc<Shared>,
    record: VaultRecord,
    requester: String,
    name_format: Arc<str>,
    dirty: bool,
    closed: bool,
}

impl VaultSession {
    pub(crate) fn new(shared: Arc<Shared>, record: VaultRecord, requester: String) -> Self {
        Self {
            shared,
            record,
            requester,
            name_format: Arc::from(DEFAULT_NAME_FORMAT),
            dirty: false,
            closed: false,
        }
    }

    /// Render [`title`](Self::title) from `name_format` instead of the default.
    pub(crate) fn with_name_format(mut self, name_format: Arc<str>) -> Self {
        self.name_format = name_format;
        self
    }

    pub fn key(&self) -> &VaultKey {
        self.record.key()
    }

    /// Name of the principal the session was delivered to.
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Display name rendered from the configured name format.
    pub fn title(&self) -> String {
        let key = self.record.key();
        self.name_format
            .replace("{PLAYER}", key.owner())
            .replace("{NUMBER}", &key.index().to_string())
    }

    /// Current contents, including unsaved edits.
    pub fn contents(&self) -> &VaultRecord {
        &self.record
    }

    pub fn slot_count(&self) -> usize {
        self.record.slot_count()
    }

    pub fn get(&self, slot: usize) -> Result<Option<&ItemDescriptor>> {
        Ok(self.record.get(slot)?)
    }

    /// Place `item` in `slot`, returning what was there.
    pub fn set(&mut self, slot: usize, item: ItemDescriptor) -> Result<Option<ItemDescriptor>> {
        self.replace(slot, Some(item))
    }

    /// Empty `slot`, returning what was there.
    pub fn clear(&mut self, slot: usize) -> Result<Option<ItemDescriptor>> {
        self.replace(slot, None)
    }

    fn replace(
        &mut self,
        slot: usize,
        item: Option<ItemDescriptor>,
    ) -> Result<Option<ItemDescriptor>> {
        if self.closed {
            return Err(AccessError::SessionClosed);
        }
        let changed = self.record.get(slot)? != item.as_ref();
        let previous = self.record.set(slot, item)?;
        self.dirty |= changed;
        Ok(previous)
    }

    /// Whether the contents differ from what was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Save (if modified) and release the vault.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.  A
    /// failed save is reported as [`AccessError::Storage`], but the key is
    /// released either way.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let key = self.record.key().clone();
        let pending = self.dirty.then(|| self.record.clone());
        self.dirty = false;
        debug!(%key, save = pending.is_some(), "closing vault session");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.finish(&key, pending).await })
            .await
            .map_err(StoreError::from)?
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let key = self.record.key().clone();
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%key, "vault session dropped without close, finishing in background");
                let pending = self.dirty.then(|| self.record.clone());
                handle.spawn(async move {
                    let _ = shared.finish(&key, pending).await;
                });
            }
            Err(_) => {
                warn!(%key, dirty = self.dirty, "vault session dropped outside a runtime, changes discarded");
                shared.release(&key);
            }
        }
    }
}

impl fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSession")
            .field("key", self.record.key())
            .field("requester", &self.requester)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{KeyStatus, LoadCoordinator};
    use vaultkeep_core::Principal;
    use vaultkeep_store::{SqliteBackend, VaultStore};

    async fn coordinator() -> LoadCoordinator {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        LoadCoordinator::new(Arc::new(VaultStore::with_backend(Arc::new(backend), 9)))
    }

    fn key(owner: &str, index: u32) -> VaultKey {
        VaultKey::new(owner, index).unwrap()
    }

    async fn open(coordinator: &LoadCoordinator, owner: &str, index: u32) -> VaultSession {
        coordinator
            .request(key(owner, index), Arc::new(Principal::new(owner)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn edits_mark_dirty_only_on_change() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "steve", 1).await;
        assert!(!session.is_dirty());

        session.clear(3).unwrap();
        assert!(!session.is_dirty());

        assert_eq!(session.set(3, "apple".into()).unwrap(), None);
        assert!(session.is_dirty());
        assert_eq!(session.get(3).unwrap().unwrap().as_str(), "apple");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn out_of_range_slot_is_index_error() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "steve", 1).await;
        let err = session.set(9, "apple".into()).unwrap_err();
        assert!(matches!(err, AccessError::Index(_)));
        assert!(!session.is_dirty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_saves_and_releases() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "steve", 2).await;
        session.set(0, "bread x4".into()).unwrap();
        session.close().await.unwrap();
        assert!(session.is_closed());
        assert_eq!(coordinator.status(&key("steve", 2)), KeyStatus::Idle);

        let reopened = open(&coordinator, "steve", 2).await;
        assert_eq!(reopened.get(0).unwrap().unwrap().as_str(), "bread x4");
    }

    #[tokio::test]
    async fn second_close_is_noop() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "steve", 1).await;
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(matches!(
            session.set(0, "apple".into()),
            Err(AccessError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn title_uses_name_format() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "alex", 7).await;
        assert_eq!(session.title(), "alex's Vault #7");
        session.close().await.unwrap();

        let mut session = open(&coordinator, "alex", 7)
            .await
            .with_name_format(Arc::from("{PLAYER} / {NUMBER}"));
        assert_eq!(session.title(), "alex / 7");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn drop_without_close_releases_in_background() {
        let coordinator = coordinator().await;
        let mut session = open(&coordinator, "steve", 5).await;
        session.set(1, "stick".into()).unwrap();
        drop(session);

        let key = key("steve", 5);
        for _ in 0..200 {
            if coordinator.status(&key) == KeyStatus::Idle {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(coordinator.status(&key), KeyStatus::Idle);

        let reopened = open(&coordinator, "steve", 5).await;
        assert_eq!(reopened.get(1).unwrap().unwrap().as_str(), "stick");
    }
}
