//! Vault quota resolution.
//!
//! A principal's quota is the highest vault number it may open.  It is
//! computed from pluggable [`QuotaSource`] strategies and the final answer is
//! the maximum over every configured source:
//!
//! 1. [`PermissionQuotaSource`] -- `Unbounded` if the unlimited permission is
//!    granted, otherwise the arithmetic maximum of every granted
//!    `<prefix><integer>` permission (0 when there are none).
//! 2. [`RankQuotaSource`] -- a limit supplied by a [`RankProvider`].
//!
//! Resolution is pure: no I/O, no caching, and it never suspends.  The result
//! reflects the principal's permissions at the moment of the call.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::principal::{PermissionSet, Principal, RankProvider};

/// Permission prefix carrying a numeric vault count.
pub const DEFAULT_QUOTA_PREFIX: &str = "playervaults.vault.";

/// Permission that lifts the vault-count limit entirely.
pub const DEFAULT_UNLIMITED_PERMISSION: &str = "playervaults.vault.unlimited";

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

/// Maximum vault index a principal may open.
///
/// `Limited(n) < Unbounded` for every `n`, so `max` combines sources directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    Limited(u32),
    Unbounded,
}

impl Quota {
    /// Whether vault `index` is within the quota.
    pub fn permits(self, index: u32) -> bool {
        match self {
            Self::Limited(max) => index <= max,
            Self::Unbounded => true,
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::Limited(0)
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unlimited"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure resolution
// ---------------------------------------------------------------------------

/// Parse the numeric suffix of `name` if it starts with `prefix`.
///
/// Only plain ASCII digits are accepted; anything else (`"unlimited"`, `"-1"`,
/// `"3.5"`, `" 3"`) is not a quota permission.  Values beyond `u32::MAX`
/// saturate.
pub fn parse_quota_permission(name: &str, prefix: &str) -> Option<u32> {
    let suffix = name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(suffix.parse::<u32>().unwrap_or(u32::MAX))
}

/// Highest granted `<prefix><integer>` permission, or 0.
pub fn permission_quota(permissions: &PermissionSet, prefix: &str) -> u32 {
    permissions
        .granted()
        .filter_map(|name| parse_quota_permission(name, prefix))
        .max()
        .unwrap_or(0)
}

/// Combine the inputs of every built-in strategy into one quota.
///
/// The operator flag is not an input: operator defaults are already part of
/// the merged `permissions`.
pub fn resolve_quota(
    permissions: &PermissionSet,
    prefix: &str,
    unlimited_granted: bool,
    rank_limit: Option<u32>,
) -> Quota {
    if unlimited_granted {
        return Quota::Unbounded;
    }
    let from_permissions = permission_quota(permissions, prefix);
    let limit = match rank_limit {
        Some(rank) => from_permissions.max(rank),
        None => from_permissions,
    };
    Quota::Limited(limit)
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of deriving a quota from a principal.
pub trait QuotaSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn quota_for(&self, principal: &Principal) -> Quota;
}

/// Permission names that drive the permission strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaPolicy {
    pub permission_prefix: String,
    pub unlimited_permission: String,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            permission_prefix: DEFAULT_QUOTA_PREFIX.to_string(),
            unlimited_permission: DEFAULT_UNLIMITED_PERMISSION.to_string(),
        }
    }
}

/// Quota from `<prefix><n>` grants and the unlimited permission.
#[derive(Debug, Clone, Default)]
pub struct PermissionQuotaSource {
    policy: QuotaPolicy,
}

impl PermissionQuotaSource {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self { policy }
    }
}

impl QuotaSource for PermissionQuotaSource {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn quota_for(&self, principal: &Principal) -> Quota {
        resolve_quota(
            &principal.permissions,
            &self.policy.permission_prefix,
            principal.has_permission(&self.policy.unlimited_permission),
            None,
        )
    }
}

/// Quota from an external rank system.
pub struct RankQuotaSource {
    provider: Arc<dyn RankProvider>,
}

impl RankQuotaSource {
    pub fn new(provider: Arc<dyn RankProvider>) -> Self {
        Self { provider }
    }
}

impl QuotaSource for RankQuotaSource {
    fn name(&self) -> &'static str {
        "rank"
    }

    fn quota_for(&self, principal: &Principal) -> Quota {
        Quota::Limited(self.provider.rank_limit(principal).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves a principal's quota across every configured [`QuotaSource`].
///
/// Cheap to clone; sources are shared.
#[derive(Clone)]
pub struct PermissionResolver {
    sources: Vec<Arc<dyn QuotaSource>>,
}

impl PermissionResolver {
    /// Resolver with only the permission strategy.
    pub fn new(policy: QuotaPolicy) -> Self {
        Self {
            sources: vec![Arc::new(PermissionQuotaSource::new(policy))],
        }
    }

    /// Add the rank strategy backed by `provider`.
    #[must_use]
    pub fn with_rank_provider(self, provider: Arc<dyn RankProvider>) -> Self {
        self.with_source(Arc::new(RankQuotaSource::new(provider)))
    }

    /// Add an arbitrary strategy.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn QuotaSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Maximum across all sources; `Limited(0)` if none are configured.
    pub fn resolve(&self, principal: &Principal) -> Quota {
        let quota = self
            .sources
            .iter()
            .map(|source| {
                let quota = source.quota_for(principal);
                tracing::trace!(
                    principal = %principal.name,
                    source = source.name(),
                    %quota,
                    "quota source evaluated"
                );
                quota
            })
            .max()
            .unwrap_or_default();

        tracing::debug!(principal = %principal.name, %quota, "quota resolved");
        quota
    }
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::new(QuotaPolicy::default())
    }
}

impl fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("PermissionResolver")
            .field("sources", &names)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::AttachedRankLimit;

    fn perms(entries: &[(&str, bool)]) -> PermissionSet {
        entries.iter().map(|(n, g)| (*n, *g)).collect()
    }

    #[test]
    fn quota_ordering() {
        assert!(Quota::Limited(3) < Quota::Limited(10));
        assert!(Quota::Limited(u32::MAX) < Quota::Unbounded);
        assert_eq!(Quota::Limited(3).max(Quota::Unbounded), Quota::Unbounded);
    }

    #[test]
    fn permits_checks_index() {
        assert!(Quota::Limited(3).permits(3));
        assert!(!Quota::Limited(3).permits(4));
        assert!(!Quota::Limited(0).permits(1));
        assert!(Quota::Unbounded.permits(u32::MAX));
    }

    #[test]
    fn parse_accepts_plain_digits_only() {
        let p = DEFAULT_QUOTA_PREFIX;
        assert_eq!(parse_quota_permission("playervaults.vault.7", p), Some(7));
        assert_eq!(parse_quota_permission("playervaults.vault.007", p), Some(7));
        assert_eq!(parse_quota_permission("playervaults.vault.unlimited", p), None);
        assert_eq!(parse_quota_permission("playervaults.vault.-1", p), None);
        assert_eq!(parse_quota_permission("playervaults.vault.3.5", p), None);
        assert_eq!(parse_quota_permission("playervaults.vault.", p), None);
        assert_eq!(parse_quota_permission("playervaults.others.view", p), None);
    }

    #[test]
    fn parse_saturates_huge_values() {
        assert_eq!(
            parse_quota_permission("s.99999999999999", "s."),
            Some(u32::MAX)
        );
    }

    #[test]
    fn arithmetic_max_not_string_order() {
        let set = perms(&[("scope.3", true), ("scope.10", true)]);
        assert_eq!(resolve_quota(&set, "scope.", false, None), Quota::Limited(10));
    }

    #[test]
    fn denied_entries_are_ignored() {
        let set = perms(&[("scope.3", true), ("scope.50", false)]);
        assert_eq!(resolve_quota(&set, "scope.", false, None), Quota::Limited(3));
    }

    #[test]
    fn no_grants_means_zero() {
        let set = perms(&[("other.9", true)]);
        assert_eq!(resolve_quota(&set, "scope.", false, None), Quota::Limited(0));
    }

    #[test]
    fn unlimited_wins() {
        let set = perms(&[("scope.3", true)]);
        assert_eq!(resolve_quota(&set, "scope.", true, Some(2)), Quota::Unbounded);
    }

    #[test]
    fn rank_limit_raises_quota() {
        let set = perms(&[("scope.3", true)]);
        assert_eq!(resolve_quota(&set, "scope.", false, Some(8)), Quota::Limited(8));
        assert_eq!(resolve_quota(&set, "scope.", false, Some(1)), Quota::Limited(3));
    }

    #[test]
    fn permission_source_honours_unlimited_permission() {
        let source = PermissionQuotaSource::default();
        let principal = Principal::new("alex").with_permissions(perms(&[
            ("playervaults.vault.2", true),
            ("playervaults.vault.unlimited", true),
        ]));
        assert_eq!(source.quota_for(&principal), Quota::Unbounded);
    }

    #[test]
    fn resolver_takes_max_across_sources() {
        let resolver =
            PermissionResolver::default().with_rank_provider(Arc::new(AttachedRankLimit));

        let principal = Principal::new("alex")
            .with_permissions(perms(&[("playervaults.vault.2", true)]))
            .with_rank_limit(Some(6));
        assert_eq!(resolver.resolve(&principal), Quota::Limited(6));

        let principal = principal.with_rank_limit(None);
        assert_eq!(resolver.resolve(&principal), Quota::Limited(2));
    }

    #[test]
    fn resolver_without_rank_ignores_attached_limit() {
        let resolver = PermissionResolver::default();
        let principal = Principal::new("alex").with_rank_limit(Some(6));
        assert_eq!(resolver.resolve(&principal), Quota::Limited(0));
    }

    #[test]
    fn quota_display() {
        assert_eq!(Quota::Limited(4).to_string(), "4");
        assert_eq!(Quota::Unbounded.to_string(), "unlimited");
    }
}
