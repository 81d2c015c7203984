//! Access error types.
//!
//! [`AccessError`] is what the request/command layer sees.  Each variant
//! carries enough structure to render a user-facing message; none of them is
//! fatal to the process.

use std::sync::Arc;

use vaultkeep_core::{CoreError, Quota, VaultKey, VaultRecord};
use vaultkeep_store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    /// The requested vault number is above the requester's quota.
    #[error("vault #{index} is above the quota of {quota}")]
    QuotaExceeded { index: u32, quota: Quota },

    /// The requester may not open another owner's vaults.
    #[error("not permitted to open vaults owned by {owner}")]
    PermissionDenied { owner: String },

    /// Another requester holds (or was first in line for) the vault.
    ///
    /// Requests that were coalesced into a load carry the loaded contents in
    /// `snapshot`; an immediate rejection of a checked-out vault does not.
    #[error("vault {key} is in use")]
    Busy {
        key: VaultKey,
        snapshot: Option<Arc<VaultRecord>>,
    },

    /// The backend failed; vault state is unchanged and the key is released.
    #[error("storage error: {0}")]
    Storage(Arc<StoreError>),

    /// Invalid key or slot index.
    #[error(transparent)]
    Index(#[from] CoreError),

    /// Storage parameters were rejected before any I/O.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The requester left while the vault was loading.
    #[error("requester went offline before the vault was delivered")]
    RequesterOffline,

    /// The session was already closed.
    #[error("vault session is closed")]
    SessionClosed,
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Configuration { reason } => Self::Configuration { reason },
            other => Self::Storage(Arc::new(other)),
        }
    }
}

impl AccessError {
    /// Contention that clears once the current holder closes its session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

/// Convenience alias used throughout the access crate.
pub type Result<T> = std::result::Result<T, AccessError>;
