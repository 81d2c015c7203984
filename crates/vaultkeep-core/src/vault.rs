//! Vault keys and records.
//!
//! A [`VaultRecord`] is a fixed-size sequence of slots, each either empty or
//! holding an opaque [`ItemDescriptor`].  The slot count comes from storage
//! configuration and never changes for the lifetime of a record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// VaultKey
// ---------------------------------------------------------------------------

/// Identifies exactly one vault: `(owner, index)`.
///
/// Owner names are compared case-insensitively, so the key stores the
/// lowercased form.  The index is always `>= 1`.  Deserialization goes
/// through [`VaultKey::new`], so a decoded key upholds the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "KeyParts", into = "KeyParts")]
pub struct VaultKey {
    owner: String,
    index: u32,
}

impl VaultKey {
    /// Build a key, normalising the owner name.
    pub fn new(owner: &str, index: u32) -> Result<Self> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(CoreError::InvalidOwner {
                reason: "owner name is empty".into(),
            });
        }
        if index == 0 {
            return Err(CoreError::InvalidIndex { index });
        }
        Ok(Self {
            owner: owner.to_lowercase(),
            index,
        })
    }

    /// The normalised (lowercase) owner identifier.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The vault number, starting at 1.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.index)
    }
}

/// Wire form of a [`VaultKey`].
#[derive(Serialize, Deserialize)]
struct KeyParts {
    owner: String,
    index: u32,
}

impl TryFrom<KeyParts> for VaultKey {
    type Error = CoreError;

    fn try_from(parts: KeyParts) -> Result<Self> {
        Self::new(&parts.owner, parts.index)
    }
}

impl From<VaultKey> for KeyParts {
    fn from(key: VaultKey) -> Self {
        Self {
            owner: key.owner,
            index: key.index,
        }
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Opaque, application-supplied description of whatever sits in a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemDescriptor(String);

impl ItemDescriptor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemDescriptor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemDescriptor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One occupied slot in the persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub slot: usize,
    pub item: ItemDescriptor,
}

// ---------------------------------------------------------------------------
// VaultRecord
// ---------------------------------------------------------------------------

/// The full contents of one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    key: VaultKey,
    slots: Vec<Option<ItemDescriptor>>,
}

impl VaultRecord {
    /// A record with every slot empty.
    pub fn empty(key: VaultKey, slot_count: usize) -> Self {
        Self {
            key,
            slots: vec![None; slot_count],
        }
    }

    /// Rebuild a record from its persisted entries.
    ///
    /// Entries addressing a slot `>= slot_count` cannot be represented and are
    /// returned separately so the caller can report them.  When two entries
    /// address the same slot the later one wins.
    pub fn from_entries(
        key: VaultKey,
        slot_count: usize,
        entries: impl IntoIterator<Item = SlotEntry>,
    ) -> (Self, Vec<SlotEntry>) {
        let mut record = Self::empty(key, slot_count);
        let mut dropped = Vec::new();
        for entry in entries {
            match record.slots.get_mut(entry.slot) {
                Some(slot) => *slot = Some(entry.item),
                None => dropped.push(entry),
            }
        }
        (record, dropped)
    }

    pub fn key(&self) -> &VaultKey {
        &self.key
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Read one slot.
    pub fn get(&self, slot: usize) -> Result<Option<&ItemDescriptor>> {
        self.slots
            .get(slot)
            .map(Option::as_ref)
            .ok_or(CoreError::SlotOutOfRange {
                slot,
                slot_count: self.slots.len(),
            })
    }

    /// Replace one slot, returning what was there before.
    pub fn set(
        &mut self,
        slot: usize,
        item: Option<ItemDescriptor>,
    ) -> Result<Option<ItemDescriptor>> {
        let slot_count = self.slots.len();
        let target = self
            .slots
            .get_mut(slot)
            .ok_or(CoreError::SlotOutOfRange { slot, slot_count })?;
        Ok(std::mem::replace(target, item))
    }

    /// Occupied slots in ascending slot order.
    pub fn entries(&self) -> Vec<SlotEntry> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| {
                item.as_ref().map(|item| SlotEntry {
                    slot,
                    item: item.clone(),
                })
            })
            .collect()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
