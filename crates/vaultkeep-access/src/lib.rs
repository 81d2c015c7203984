//! # vaultkeep-access
//!
//! Turns "open vault N of owner X for requester R" into an exclusive
//! [`VaultSession`], or a reason why not.
//!
//! - **[`service`]** -- [`VaultService`]: quota and view-others checks in
//!   front of the coordinator.
//! - **[`coordinator`]** -- [`LoadCoordinator`]: one backend read per key,
//!   coalesced waiters, strict single checkout.
//! - **[`session`]** -- [`VaultSession`]: slot edits, save-on-close, release.
//! - **[`error`]** -- [`AccessError`].

pub mod coordinator;
pub mod error;
pub mod service;
pub mod session;

pub use coordinator::{KeyStatus, LoadCoordinator};
pub use error::{AccessError, Result};
pub use service::{DEFAULT_OTHERS_PERMISSION, VaultService};
pub use session::{DEFAULT_NAME_FORMAT, VaultSession};
