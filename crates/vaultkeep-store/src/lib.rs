//! # vaultkeep-store
//!
//! Vault persistence for vaultkeep.
//!
//! [`VaultStore`] maps `(owner, index)` keys to [`vaultkeep_core::VaultRecord`]s
//! through a pluggable [`VaultBackend`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  VaultStore (empty-record synthesis, close) │
//! ├──────────────────────┬──────────────────────┤
//! │  SqliteBackend       │  FileBackend         │
//! │  Database (WAL)      │  <root>/<owner>/N    │
//! │  Migrations          │                      │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use vaultkeep_store::{StoreConfig, VaultStore};
//!
//! let store = VaultStore::open(&StoreConfig::default()).await?;
//! let record = store.load_vault(&key).await?;
//! store.save_vault(&record).await?;
//! store.close().await?;
//! ```

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod migration;
pub mod sqlite;
pub mod store;

// ── re-exports ───────────────────────────────────────────────────────

pub use backend::VaultBackend;
pub use config::{BackendKind, MAX_SLOT_COUNT, StoreConfig};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use sqlite::SqliteBackend;
pub use store::VaultStore;
