//! [`VaultService`]: the entry point the command layer talks to.
//!
//! A request for one's own vault is checked against the resolved quota; a
//! request for someone else's vault needs the "view others" permission
//! instead.  Either way the load itself goes through the [`LoadCoordinator`].

use std::sync::Arc;

use tracing::{debug, info};
use vaultkeep_core::{PermissionResolver, Principal, Quota, Requester, VaultKey};
use vaultkeep_store::{StoreConfig, VaultStore};

use crate::coordinator::{KeyStatus, LoadCoordinator};
use crate::error::{AccessError, Result};
use crate::session::{DEFAULT_NAME_FORMAT, VaultSession};

/// Permission that lets a principal open vaults owned by others.
pub const DEFAULT_OTHERS_PERMISSION: &str = "playervaults.others.view";

#[derive(Debug, Clone)]
pub struct VaultService {
    coordinator: LoadCoordinator,
    resolver: PermissionResolver,
    others_permission: String,
    name_format: Arc<str>,
}

impl VaultService {
    /// Service with its own [`LoadCoordinator`] over `store`.
    ///
    /// Clone the service to share it.  A second service on the same store
    /// needs [`with_coordinator`](Self::with_coordinator), otherwise the two
    /// do not see each other's checkouts.
    pub fn new(store: Arc<VaultStore>, resolver: PermissionResolver) -> Self {
        Self::with_coordinator(LoadCoordinator::new(store), resolver)
    }

    /// Service that checks vaults out through an existing coordinator.
    pub fn with_coordinator(coordinator: LoadCoordinator, resolver: PermissionResolver) -> Self {
        Self {
            coordinator,
            resolver,
            others_permission: DEFAULT_OTHERS_PERMISSION.to_string(),
            name_format: Arc::from(DEFAULT_NAME_FORMAT),
        }
    }

    /// Open the configured store and build a service on top of it.
    pub async fn open(config: &StoreConfig, resolver: PermissionResolver) -> Result<Self> {
        let store = VaultStore::open(config).await?;
        Ok(Self::new(Arc::new(store), resolver))
    }

    #[must_use]
    pub fn with_others_permission(mut self, permission: impl Into<String>) -> Self {
        self.others_permission = permission.into();
        self
    }

    /// Replace the title template used by sessions (`{PLAYER}`, `{NUMBER}`).
    #[must_use]
    pub fn with_name_format(mut self, name_format: impl Into<String>) -> Self {
        self.name_format = Arc::from(name_format.into());
        self
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<VaultStore> {
        self.coordinator.store()
    }

    /// Number of vaults `principal` may open, evaluated now.
    pub fn get_quota(&self, principal: &Principal) -> Quota {
        self.resolver.resolve(principal)
    }

    /// Check out vault `index` of `owner` on behalf of `requester`.
    pub async fn request_vault(
        &self,
        owner: &str,
        index: u32,
        requester: Arc<dyn Requester>,
    ) -> Result<VaultSession> {
        let key = VaultKey::new(owner, index)?;
        let principal = requester.principal();

        if principal.is_named(key.owner()) {
            let quota = self.get_quota(principal);
            if !quota.permits(index) {
                debug!(%key, %quota, "vault request above quota");
                return Err(AccessError::QuotaExceeded { index, quota });
            }
        } else if !principal.has_permission(&self.others_permission) {
            debug!(%key, requester = %principal.name, "viewing other vaults not permitted");
            return Err(AccessError::PermissionDenied {
                owner: key.owner().to_string(),
            });
        }

        let session = self.coordinator.request(key, requester).await?;
        Ok(session.with_name_format(Arc::clone(&self.name_format)))
    }

    /// State of vault `index` of `owner`.
    pub fn status(&self, owner: &str, index: u32) -> Result<KeyStatus> {
        Ok(self.coordinator.status(&VaultKey::new(owner, index)?))
    }

    /// Flush and release the store.  Call once at shutdown, after sessions
    /// have been closed.
    pub async fn close_store(&self) -> Result<()> {
        let active = self.coordinator.active();
        if active > 0 {
            info!(active, "closing vault store with vaults still in use");
        }
        self.store().close().await?;
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
