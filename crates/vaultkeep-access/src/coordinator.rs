//! Per-key load coordination.
//!
//! The [`LoadCoordinator`] keeps one entry per vault key that is not idle:
//!
//! ```text
//!   idle ──request──▶ loading(waiters) ──load ok──▶ checked-out ──close──▶ idle
//!                          │  ▲                           │
//!                          │  └──request (coalesced)      └──request: Busy
//!                          └──load failed──▶ idle
//! ```
//!
//! Only the first request for an idle key issues a backend read; requests
//! arriving while that read is in flight join its waiter list.  When the read
//! completes the first waiter receives the [`VaultSession`], the rest receive
//! [`AccessError::Busy`] carrying the same loaded contents.
//!
//! The backend read runs on its own task, so a requester that gives up (drops
//! its future) never aborts the read or strands the key.  State lives in a
//! [`DashMap`]; no shard lock is held across an `.await`.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use vaultkeep_core::{Requester, VaultKey, VaultRecord};
use vaultkeep_store::{StoreError, VaultStore};

use crate::error::{AccessError, Result};
use crate::session::VaultSession;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

type Delivery = oneshot::Sender<Result<VaultSession>>;

struct Waiter {
    requester: Arc<dyn Requester>,
    tx: Delivery,
}

enum KeyState {
    Loading { waiters: Vec<Waiter> },
    CheckedOut,
}

/// Observable state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Idle,
    Loading { waiters: usize },
    CheckedOut,
}

/// State shared between the coordinator and every session it hands out.
pub(crate) struct Shared {
    pub(crate) store: Arc<VaultStore>,
    states: DashMap<VaultKey, KeyState>,
}

impl Shared {
    /// Save `record` (if any), then return `key` to idle.
    ///
    /// The key is released whether or not the save succeeds.
    pub(crate) async fn finish(&self, key: &VaultKey, record: Option<VaultRecord>) -> Result<()> {
        let saved = match record {
            Some(record) => self.store.save_vault(&record).await,
            None => Ok(()),
        };
        if let Err(err) = &saved {
            warn!(%key, %err, "saving vault on close failed");
        }
        self.release(key);
        saved.map_err(AccessError::from)
    }

    /// Drop the checkout on `key`.
    pub(crate) fn release(&self, key: &VaultKey) {
        let removed = self
            .states
            .remove_if(key, |_, state| matches!(state, KeyState::CheckedOut));
        if removed.is_some() {
            debug!(%key, "vault released");
        } else {
            warn!(%key, "release requested for a vault that was not checked out");
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Serializes and deduplicates vault loads per key.
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone)]
pub struct LoadCoordinator {
    shared: Arc<Shared>,
}

impl LoadCoordinator {
    /// Coordinator over `store`.
    ///
    /// Exclusivity holds per coordinator: every requester of a store must go
    /// through the same instance (or its clones).
    pub fn new(store: Arc<VaultStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                states: DashMap::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<VaultStore> {
        &self.shared.store
    }

    /// Current state of `key`.
    pub fn status(&self, key: &VaultKey) -> KeyStatus {
        match self.shared.states.get(key).as_deref() {
            None => KeyStatus::Idle,
            Some(KeyState::Loading { waiters }) => KeyStatus::Loading {
                waiters: waiters.len(),
            },
            Some(KeyState::CheckedOut) => KeyStatus::CheckedOut,
        }
    }

    /// Number of keys that are loading or checked out.
    pub fn active(&self) -> usize {
        self.shared.states.len()
    }

    /// Check out `key` for `requester`.
    ///
    /// Resolves once the vault is loaded: with a session for the first
    /// requester in line, with [`AccessError::Busy`] for anyone else.
    pub async fn request(
        &self,
        key: VaultKey,
        requester: Arc<dyn Requester>,
    ) -> Result<VaultSession> {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter { requester, tx };

        let leader = match self.shared.states.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(KeyState::Loading {
                    waiters: vec![waiter],
                });
                true
            }
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                KeyState::Loading { waiters } => {
                    waiters.push(waiter);
                    debug!(%key, waiters = waiters.len(), "joined in-flight load");
                    false
                }
                KeyState::CheckedOut => {
                    debug!(%key, "vault already checked out");
                    return Err(AccessError::Busy {
                        key,
                        snapshot: None,
                    });
                }
            },
        };

        if leader {
            debug!(%key, "starting vault load");
            let shared = Arc::clone(&self.shared);
            tokio::spawn(load_and_deliver(shared, key));
        }

        rx.await.unwrap_or_else(|_| {
            Err(StoreError::TaskJoin("vault load task ended without a result".into()).into())
        })
    }
}

impl fmt::Debug for LoadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCoordinator")
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Load task
// ---------------------------------------------------------------------------

async fn load_and_deliver(shared: Arc<Shared>, key: VaultKey) {
    let loaded = shared.store.load_vault(&key).await;

    // Take the waiters and move to the next state under one shard lock, so no
    // request can slip in between.
    let waiters = match shared.states.entry(key.clone()) {
        Entry::Occupied(mut occupied) => {
            let previous = if loaded.is_ok() {
                std::mem::replace(occupied.get_mut(), KeyState::CheckedOut)
            } else {
                occupied.remove()
            };
            match previous {
                KeyState::Loading { waiters } => waiters,
                KeyState::CheckedOut => Vec::new(),
            }
        }
        Entry::Vacant(_) => Vec::new(),
    };

    let record = match loaded {
        Ok(record) => record,
        Err(err) => {
            warn!(%key, %err, waiters = waiters.len(), "vault load failed");
            let err = AccessError::from(err);
            for waiter in waiters {
                let _ = waiter.tx.send(Err(err.clone()));
            }
            return;
        }
    };

    let mut waiters = waiters.into_iter();
    let Some(first) = waiters.next() else {
        // Nobody to hand it to; undo the checkout.
        shared.release(&key);
        return;
    };

    let rest: Vec<Waiter> = waiters.collect();
    if !rest.is_empty() {
        let snapshot = Arc::new(record.clone());
        debug!(%key, rejected = rest.len(), "coalesced requesters rejected as busy");
        for waiter in rest {
            let _ = waiter.tx.send(Err(AccessError::Busy {
                key: key.clone(),
                snapshot: Some(Arc::clone(&snapshot)),
            }));
        }
    }

    let name = first.requester.principal().name.clone();
    let mut session = VaultSession::new(Arc::clone(&shared), record, name);

    if !first.requester.is_online() {
        warn!(%key, requester = session.requester(), "requester went offline before delivery");
        let _ = session.close().await;
        let _ = first.tx.send(Err(AccessError::RequesterOffline));
        return;
    }

    if let Err(Ok(mut session)) = first.tx.send(Ok(session)) {
        warn!(%key, requester = session.requester(), "requester abandoned the request");
        let _ = session.close().await;
        return;
    }

    debug!(%key, "vault session delivered");
}

// ── tests ────────────────────────────────────────────────────────────
