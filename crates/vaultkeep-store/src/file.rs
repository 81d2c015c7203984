//! Directory-of-JSON vault backend.
//!
//! Layout: `<root>/<owner>/<index>.json`, one document per vault.  Owner names
//! are escaped so that any identifier maps to a single safe path component.
//! Writes go to a sibling `.tmp` file, are synced to disk, and are then
//! renamed into place, so a crash mid-write never leaves a truncated document
//! behind and `save` returns only once the document is durable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use vaultkeep_core::{SlotEntry, VaultKey};

use crate::backend::VaultBackend;
use crate::error::StoreResult;

/// On-disk document for one vault.
#[derive(Debug, Serialize, Deserialize)]
struct VaultDocument {
    owner: String,
    index: u32,
    slots: Vec<SlotEntry>,
}

/// Vault persistence as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Use `root` as the storage directory, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "file vault backend ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(escape_component(owner))
    }

    fn document_path(&self, key: &VaultKey) -> PathBuf {
        self.owner_dir(key.owner())
            .join(format!("{}.json", key.index()))
    }
}

/// Map an arbitrary owner name to one path component.
///
/// ASCII alphanumerics, `_` and `-` pass through; every other byte becomes
/// `%XX`.  `.` is escaped too, which rules out `.` and `..`.
fn escape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Persist a rename inside `dir`.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> StoreResult<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> StoreResult<()> {
    Ok(())
}

#[async_trait]
impl VaultBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self, key), fields(key = %key))]
    async fn load(&self, key: &VaultKey) -> StoreResult<Option<Vec<SlotEntry>>> {
        let path = self.document_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: VaultDocument = serde_json::from_str(&raw)?;
        Ok(Some(document.slots))
    }

    #[instrument(skip(self, key, entries), fields(key = %key, occupied = entries.len()))]
    async fn save(&self, key: &VaultKey, entries: &[SlotEntry]) -> StoreResult<()> {
        let dir = self.owner_dir(key.owner());
        tokio::fs::create_dir_all(&dir).await?;

        let document = VaultDocument {
            owner: key.owner().to_string(),
            index: key.index(),
            slots: entries.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let path = self.document_path(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;
        sync_dir(&dir).await?;

        debug!(path = %path.display(), "vault document written");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        // Nothing is buffered: `save` syncs each document before returning.
        info!(root = %self.root.display(), "file vault backend closed");
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

    #[test]
    fn escape_keeps_simple_names() {
        assert_eq!(escape_component("steve_01-x"), "steve_01-x");
    }

    #[test]
    fn escape_neutralises_path_tricks() {
        assert_eq!(escape_component(".."), "%2E%2E");
        assert_eq!(escape_component("a/b"), "a%2Fb");
        assert!(!escape_component("é").contains('é'));
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        assert!(backend.load(&key("steve", 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_writes_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        let k = key("Steve", 4);
        let entries = vec![entry(2, "apple:3")];

        backend.save(&k, &entries).await.unwrap();

        assert!(dir.path().join("steve").join("4.json").is_file());
        assert!(!dir.path().join("steve").join("4.json.tmp").exists());
        assert_eq!(backend.load(&k).await.unwrap(), Some(entries));
    }

    #[tokio::test]
    async fn stale_temp_file_is_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        let k = key("steve", 2);
        let owner_dir = dir.path().join("steve");
        std::fs::create_dir_all(&owner_dir).unwrap();
        std::fs::write(owner_dir.join("2.json.tmp"), b"{\"trunc").unwrap();

        assert_eq!(backend.load(&k).await.unwrap(), None);
        backend.save(&k, &[entry(5, "compass")]).await.unwrap();
        backend.close().await.unwrap();

        assert!(!owner_dir.join("2.json.tmp").exists());
        let reopened = FileBackend::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load(&k).await.unwrap(), Some(vec![entry(5, "compass")]));
    }

    #[tokio::test]
    async fn save_overwrites_document() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        let k = key("steve", 1);

        backend.save(&k, &[entry(0, "a"), entry(1, "b")]).await.unwrap();
        backend.save(&k, &[entry(3, "c")]).await.unwrap();

        assert_eq!(backend.load(&k).await.unwrap(), Some(vec![entry(3, "c")]));
    }

    #[tokio::test]
    async fn open_creates_nested_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("b");
        FileBackend::open(&root).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        std::fs::create_dir_all(dir.path().join("steve")).unwrap();
        std::fs::write(dir.path().join("steve").join("1.json"), b"{").unwrap();

        assert!(backend.load(&key("steve", 1)).await.is_err());
    }
}
