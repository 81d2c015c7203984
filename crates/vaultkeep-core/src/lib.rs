//! vaultkeep core domain.
//!
//! This crate holds the pieces of the vault system that never touch I/O:
//!
//! - **[`vault`]** -- [`VaultKey`], [`VaultRecord`] and the opaque
//!   [`ItemDescriptor`] stored in each slot.
//! - **[`principal`]** -- principals, merged permission sets, and the
//!   [`PermissionProvider`] / [`RankProvider`] seams.
//! - **[`quota`]** -- quota resolution across pluggable [`QuotaSource`]
//!   strategies.
//! - **[`error`]** -- [`CoreError`] via [`thiserror`].
//!
//! Everything here is `Send + Sync` and free of async.

pub mod error;
pub mod principal;
pub mod quota;
pub mod vault;

// Re-export the most commonly used types at the crate root for convenience.
pub use error::{CoreError, Result};
pub use principal::{
    AttachedRankLimit, PermissionProvider, PermissionSet, Principal, RankProvider, Requester,
};
pub use quota::{
    DEFAULT_QUOTA_PREFIX, DEFAULT_UNLIMITED_PERMISSION, PermissionQuotaSource, PermissionResolver,
    Quota, QuotaPolicy, QuotaSource, RankQuotaSource, permission_quota, resolve_quota,
};
pub use vault::{ItemDescriptor, SlotEntry, VaultKey, VaultRecord};
