//! Application configuration.
//!
//! Reads `config/vaultkeep.toml` (or the `--config` path).  A missing file
//! yields defaults; a file that does not parse is an error.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use vaultkeep_access::{DEFAULT_NAME_FORMAT, DEFAULT_OTHERS_PERMISSION};
use vaultkeep_core::{
    DEFAULT_QUOTA_PREFIX, DEFAULT_UNLIMITED_PERMISSION, PermissionProvider, PermissionSet,
    Principal, QuotaPolicy, RankProvider,
};
use vaultkeep_store::StoreConfig;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/vaultkeep.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub storage: StoreConfig,
    pub quota: QuotaSection,
    pub vault: VaultSection,
    pub permissions: PermissionsSection,
    /// Rank name to vault-count limit.
    pub ranks: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaSection {
    pub permission_prefix: String,
    pub unlimited_permission: String,
    pub others_permission: String,
}

impl Default for QuotaSection {
    fn default() -> Self {
        Self {
            permission_prefix: DEFAULT_QUOTA_PREFIX.to_string(),
            unlimited_permission: DEFAULT_UNLIMITED_PERMISSION.to_string(),
            others_permission: DEFAULT_OTHERS_PERMISSION.to_string(),
        }
    }
}

impl QuotaSection {
    pub fn policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            permission_prefix: self.permission_prefix.clone(),
            unlimited_permission: self.unlimited_permission.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultSection {
    pub name_format: String,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            name_format: DEFAULT_NAME_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsSection {
    /// Granted to everyone.
    pub defaults: PermissionSet,
    /// Granted to operators, on top of `defaults`.
    pub operator_defaults: PermissionSet,
    pub players: BTreeMap<String, PlayerEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerEntry {
    pub operator: bool,
    pub grants: PermissionSet,
    /// Name of an entry in `[ranks]`.
    pub rank: Option<String>,
    /// Limit attached directly to this player.
    pub rank_limit: Option<u32>,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.storage.validate()?;
        Ok(config)
    }

    /// Principal lookup backed by the `[permissions]` section.
    pub fn permission_provider(&self) -> ConfigPermissions {
        ConfigPermissions {
            section: self.permissions.clone(),
        }
    }

    /// Rank lookup backed by `[ranks]` and per-player `rank` names.
    pub fn rank_provider(&self) -> ConfiguredRanks {
        let assignments = self
            .permissions
            .players
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .rank
                    .as_ref()
                    .map(|rank| (name.trim().to_lowercase(), rank.clone()))
            })
            .collect();
        ConfiguredRanks {
            assignments,
            limits: self.ranks.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConfigPermissions {
    section: PermissionsSection,
}

impl ConfigPermissions {
    fn entry(&self, name: &str) -> Option<&PlayerEntry> {
        let wanted = name.trim().to_lowercase();
        self.section
            .players
            .iter()
            .find(|(player, _)| player.trim().to_lowercase() == wanted)
            .map(|(_, entry)| entry)
    }
}

impl PermissionProvider for ConfigPermissions {
    fn principal(&self, name: &str) -> Principal {
        let entry = self.entry(name).cloned().unwrap_or_default();

        let defaults = if entry.operator {
            PermissionSet::merged(&self.section.defaults, &self.section.operator_defaults)
        } else {
            self.section.defaults.clone()
        };

        Principal::new(name.trim())
            .with_operator(entry.operator)
            .with_permissions(PermissionSet::merged(&defaults, &entry.grants))
            .with_rank_limit(entry.rank_limit)
    }
}

/// Limits from the `[ranks]` table.  A player's limit is the larger of their
/// named rank's limit and any limit attached directly to them.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredRanks {
    assignments: BTreeMap<String, String>,
    limits: BTreeMap<String, u32>,
}

impl RankProvider for ConfiguredRanks {
    fn rank_limit(&self, principal: &Principal) -> Option<u32> {
        let named = self
            .assignments
            .get(&principal.name.trim().to_lowercase())
            .and_then(|rank| self.limits.get(rank).copied());
        named.max(principal.rank_limit)
    }
}

// ── tests ────────────────────────────────────────────────────────────
