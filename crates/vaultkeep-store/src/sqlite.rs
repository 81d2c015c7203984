//! SQLite vault backend.
//!
//! Each vault is one row in the `vaults` table; `contents` holds the occupied
//! slots as a JSON array of `{"slot": n, "item": "..."}` objects.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, info, instrument};
use vaultkeep_core::{SlotEntry, VaultKey};

use crate::backend::VaultBackend;
use crate::db::Database;
use crate::error::StoreResult;

/// Vault persistence on top of [`Database`].
#[derive(Clone)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    /// Wrap an already-migrated database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) the database at `path` and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Database::open_and_migrate(path).await?;
        Ok(Self::new(db))
    }

    /// Migrated in-memory database, for tests.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let db = Database::open_in_memory()?;
        db.run_migrations().await?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl VaultBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn load(&self, key: &VaultKey) -> StoreResult<Option<Vec<SlotEntry>>> {
        let owner = key.owner().to_string();
        let number = key.index();
        self.db
            .execute(move |conn| {
                let contents: Option<String> = conn
                    .query_row(
                        "SELECT contents FROM vaults WHERE owner = ?1 AND number = ?2",
                        rusqlite::params![owner, number],
                        |row| row.get(0),
                    )
                    .optional()?;

                match contents {
                    Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    #[instrument(skip(self, key, entries), fields(key = %key, occupied = entries.len()))]
    async fn save(&self, key: &VaultKey, entries: &[SlotEntry]) -> StoreResult<()> {
        let owner = key.owner().to_string();
        let number = key.index();
        let contents = serde_json::to_string(entries)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO vaults (owner, number, contents, updated_at) VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(owner, number) DO UPDATE SET \
                        contents = excluded.contents, updated_at = excluded.updated_at",
                    rusqlite::params![owner, number, contents, now],
                )?;
                Ok(())
            })
            .await?;

        debug!("vault row written");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.db.checkpoint().await?;
        info!("sqlite vault backend closed");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(owner: &str, index: u32) -> VaultKey {
        VaultKey::new(owner, index).unwrap()
    }

    fn entry(slot: usize, item: &str) -> SlotEntry {
        SlotEntry {
            slot,
            item: item.into(),
        }
    }

    #[tokio::test]
    async fn load_missing_returns_none() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        assert!(backend.load(&key("steve", 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        let k = key("steve", 3);
        let entries = vec![entry(0, "dirt:64"), entry(8, "bow")];

        backend.save(&k, &entries).await.unwrap();
        assert_eq!(backend.load(&k).await.unwrap(), Some(entries));
    }

    #[tokio::test]
    async fn save_overwrites() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        let k = key("steve", 1);

        backend.save(&k, &[entry(0, "old")]).await.unwrap();
        backend.save(&k, &[entry(5, "new")]).await.unwrap();

        assert_eq!(backend.load(&k).await.unwrap(), Some(vec![entry(5, "new")]));
    }

    #[tokio::test]
    async fn saved_empty_is_distinct_from_missing() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        let k = key("steve", 2);
        backend.save(&k, &[]).await.unwrap();
        assert_eq!(backend.load(&k).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.save(&key("steve", 1), &[entry(0, "a")]).await.unwrap();
        backend.save(&key("alex", 1), &[entry(0, "b")]).await.unwrap();

        assert_eq!(
            backend.load(&key("steve", 1)).await.unwrap(),
            Some(vec![entry(0, "a")])
        );
        assert_eq!(
            backend.load(&key("alex", 1)).await.unwrap(),
            Some(vec![entry(0, "b")])
        );
        assert!(backend.load(&key("steve", 2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_contents_surface_as_json_error() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend
            .database()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO vaults (owner, number, contents, updated_at) \
                     VALUES ('steve', 1, 'not json', 0)",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = backend.load(&key("steve", 1)).await.unwrap_err();
        assert!(matches!(err, crate::StoreError::Json(_)));
    }
}
