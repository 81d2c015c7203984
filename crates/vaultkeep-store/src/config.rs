//! Storage backend configuration.
//!
//! Deserialized from the `[storage]` table of the application config:
//!
//! ```toml
//! [storage]
//! type = "sqlite"          # or "file"; "relational" is an alias of "sqlite"
//! path = "data/vaults.db"  # database file, or directory for the file backend
//! slot_count = 54
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Largest supported slot count (a double chest).
pub const MAX_SLOT_COUNT: usize = 54;

/// Which backend persists vault records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One JSON document per vault under a directory.
    File,
    /// A single SQLite database.
    #[serde(alias = "relational")]
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for [`crate::VaultStore::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    pub path: PathBuf,
    pub slot_count: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            path: PathBuf::from("data/vaults.db"),
            slot_count: MAX_SLOT_COUNT,
        }
    }
}

impl StoreConfig {
    /// Reject parameters no backend can work with.
    pub fn validate(&self) -> StoreResult<()> {
        if self.slot_count == 0 || self.slot_count > MAX_SLOT_COUNT {
            return Err(StoreError::config(format!(
                "slot_count must be between 1 and {MAX_SLOT_COUNT}, got {}",
                self.slot_count
            )));
        }

        if self.path.as_os_str().is_empty() {
            return Err(StoreError::config("storage path is empty"));
        }

        match self.backend {
            BackendKind::File if self.path.is_file() => Err(StoreError::config(format!(
                "file backend needs a directory, but {} is a file",
                self.path.display()
            ))),
            BackendKind::Sqlite if self.path.is_dir() => Err(StoreError::config(format!(
                "sqlite backend needs a database file, but {} is a directory",
                self.path.display()
            ))),
            _ => Ok(()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
