//! Principals, their permission sets, and the providers that supply them.
//!
//! Permission grants are *consumed* here, never administered: a
//! [`PermissionProvider`] hands back a [`Principal`] whose permission set is
//! already merged from defaults and effective grants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PermissionSet
// ---------------------------------------------------------------------------

/// Mapping of permission name to granted/denied.
///
/// An explicit `false` is kept (rather than removed) so that an effective
/// denial can override a default grant during [`PermissionSet::merged`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    grants: BTreeMap<String, bool>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant (`true`) or explicit denial (`false`).
    pub fn insert(&mut self, name: impl Into<String>, granted: bool) {
        self.grants.insert(name.into(), granted);
    }

    /// Builder-style grant.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, granted: bool) -> Self {
        self.insert(name, granted);
        self
    }

    /// `true` only if `name` is present and granted.
    pub fn is_granted(&self, name: &str) -> bool {
        self.grants.get(name).copied().unwrap_or(false)
    }

    /// Granted permission names.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.grants
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(name, _)| name.as_str())
    }

    /// All entries, granted or not.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.grants.iter().map(|(name, granted)| (name.as_str(), *granted))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Defaults first, then effective grants on top.
    pub fn merged(defaults: &PermissionSet, effective: &PermissionSet) -> Self {
        let mut grants = defaults.grants.clone();
        grants.extend(effective.grants.iter().map(|(k, v)| (k.clone(), *v)));
        Self { grants }
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The identity requesting vault access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Display name; vault ownership compares it case-insensitively.
    pub name: String,
    /// Server operator flag. Operator defaults are folded into `permissions`
    /// by the provider before the principal reaches the resolver.
    pub is_operator: bool,
    /// Merged default + effective permission grants.
    pub permissions: PermissionSet,
    /// Externally supplied vault-count limit (e.g. from a rank system).
    pub rank_limit: Option<u32>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_operator: false,
            permissions: PermissionSet::new(),
            rank_limit: None,
        }
    }

    #[must_use]
    pub fn with_operator(mut self, is_operator: bool) -> Self {
        self.is_operator = is_operator;
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_rank_limit(mut self, rank_limit: Option<u32>) -> Self {
        self.rank_limit = rank_limit;
        self
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.is_granted(name)
    }

    /// Whether this principal owns vaults stored under `owner`.
    pub fn is_named(&self, owner: &str) -> bool {
        self.name.trim().to_lowercase() == owner.trim().to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Requester
// ---------------------------------------------------------------------------

/// Whoever is waiting for a vault session to be delivered.
///
/// The delivery path checks [`Requester::is_online`] after the asynchronous
/// load completes; an offline requester is never handed the session.
pub trait Requester: Send + Sync {
    /// The identity quota and ownership checks run against.
    fn principal(&self) -> &Principal;

    fn is_online(&self) -> bool {
        true
    }
}

impl Requester for Principal {
    fn principal(&self) -> &Principal {
        self
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Source of merged permission sets and operator flags.
pub trait PermissionProvider: Send + Sync {
    /// Resolve `name` into a principal. Unknown names yield a principal with
    /// only the default grants applied.
    fn principal(&self, name: &str) -> Principal;
}

/// Source of an external per-principal vault-count limit.
pub trait RankProvider: Send + Sync {
    fn rank_limit(&self, principal: &Principal) -> Option<u32>;
}

/// Reads the limit already attached to the principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachedRankLimit;

impl RankProvider for AttachedRankLimit {
    fn rank_limit(&self, principal: &Principal) -> Option<u32> {
        principal.rank_limit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
