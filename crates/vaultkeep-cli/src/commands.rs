//! Command handlers.
//!
//! Each handler returns the lines to print.  Refusals (quota, permissions,
//! busy vaults, bad numbers) are ordinary output; only storage failures are
//! errors.

use std::sync::Arc;

use anyhow::{Context, Result};
use vaultkeep_access::{AccessError, VaultService, VaultSession};
use vaultkeep_core::{
    CoreError, ItemDescriptor, PermissionProvider, PermissionResolver, Principal, Quota,
};

use crate::config::AppConfig;

pub struct Console {
    service: VaultService,
    permissions: Arc<dyn PermissionProvider>,
    others_permission: String,
}

/// Whose vault a command targets, from the requester's point of view.
struct Target<'a> {
    owner: &'a str,
    number: u32,
    own: bool,
}

impl Target<'_> {
    fn describe(&self) -> String {
        if self.own {
            format!("vault #{}", self.number)
        } else {
            format!("{}'s vault #{}", self.owner, self.number)
        }
    }
}

impl Console {
    pub fn new(
        service: VaultService,
        permissions: Arc<dyn PermissionProvider>,
        others_permission: impl Into<String>,
    ) -> Self {
        Self {
            service,
            permissions,
            others_permission: others_permission.into(),
        }
    }

    /// Open the configured store and wire the providers from `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let resolver = PermissionResolver::new(config.quota.policy())
            .with_rank_provider(Arc::new(config.rank_provider()));
        let service = VaultService::open(&config.storage, resolver)
            .await
            .context("failed to open vault store")?
            .with_others_permission(config.quota.others_permission.clone())
            .with_name_format(config.vault.name_format.clone());

        Ok(Self::new(
            service,
            Arc::new(config.permission_provider()),
            config.quota.others_permission.clone(),
        ))
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.service
            .close_store()
            .await
            .context("failed to close vault store")
    }

    // -----------------------------------------------------------------------
    // quota
    // -----------------------------------------------------------------------

    pub fn quota(&self, player: &str) -> Vec<String> {
        let principal = self.permissions.principal(player);
        let line = match self.service.get_quota(&principal) {
            Quota::Unbounded => format!("{} may open unlimited vaults.", principal.name),
            Quota::Limited(1) => format!("{} may open 1 vault.", principal.name),
            Quota::Limited(n) => format!("{} may open {n} vaults.", principal.name),
        };
        vec![line]
    }

    // -----------------------------------------------------------------------
    // open / put / clear
    // -----------------------------------------------------------------------

    /// Open a vault and list its contents.
    pub async fn open(&self, number: u32, owner: Option<&str>, player: &str) -> Result<Vec<String>> {
        let principal = Arc::new(self.permissions.principal(player));
        let target = self.target(&principal, owner, number);
        let mut session = match self.checkout(&principal, &target).await? {
            Ok(session) => session,
            Err(refusal) => return Ok(refusal),
        };

        let mut lines = vec![format!("Opening {}...", target.describe()), session.title()];
        let contents = session.contents();
        if contents.is_empty() {
            lines.push("  (empty)".to_string());
        } else {
            lines.extend(
                contents
                    .entries()
                    .into_iter()
                    .map(|entry| format!("  [{:>2}] {}", entry.slot, entry.item.as_str())),
            );
        }

        session.close().await.context("failed to close vault")?;
        Ok(lines)
    }

    /// Put `item` into `slot`.
    pub async fn put(
        &self,
        number: u32,
        slot: usize,
        item: &str,
        owner: Option<&str>,
        player: &str,
    ) -> Result<Vec<String>> {
        self.edit(number, slot, Some(ItemDescriptor::new(item)), owner, player)
            .await
    }

    /// Empty `slot`.
    pub async fn clear(
        &self,
        number: u32,
        slot: usize,
        owner: Option<&str>,
        player: &str,
    ) -> Result<Vec<String>> {
        self.edit(number, slot, None, owner, player).await
    }

    async fn edit(
        &self,
        number: u32,
        slot: usize,
        item: Option<ItemDescriptor>,
        owner: Option<&str>,
        player: &str,
    ) -> Result<Vec<String>> {
        let principal = Arc::new(self.permissions.principal(player));
        let target = self.target(&principal, owner, number);
        let mut session = match self.checkout(&principal, &target).await? {
            Ok(session) => session,
            Err(refusal) => return Ok(refusal),
        };

        let placed = item.as_ref().map(|item| item.as_str().to_string());
        let edited = match item {
            Some(item) => session.set(slot, item),
            None => session.clear(slot),
        };

        let line = match edited {
            Ok(previous) => {
                let previous = previous.map(|p| p.as_str().to_string());
                match (placed, previous) {
                    (Some(new), None) => format!("Put {new} in slot {slot} of {}.", target.describe()),
                    (Some(new), Some(old)) => format!(
                        "Replaced {old} with {new} in slot {slot} of {}.",
                        target.describe()
                    ),
                    (None, Some(old)) => {
                        format!("Removed {old} from slot {slot} of {}.", target.describe())
                    }
                    (None, None) => format!("Slot {slot} of {} is already empty.", target.describe()),
                }
            }
            Err(AccessError::Index(CoreError::SlotOutOfRange { slot, slot_count })) => {
                format!("Slot {slot} is out of range (0-{}).", slot_count.saturating_sub(1))
            }
            Err(err) => {
                session.close().await.ok();
                return Err(err).context("failed to edit vault");
            }
        };

        session.close().await.context("failed to save vault")?;
        Ok(vec![line])
    }

    // -----------------------------------------------------------------------
    // Shared
    // -----------------------------------------------------------------------

    fn target<'a>(&self, principal: &'a Principal, owner: Option<&'a str>, number: u32) -> Target<'a> {
        let owner = owner.unwrap_or(principal.name.as_str());
        Target {
            owner,
            number,
            own: principal.is_named(owner),
        }
    }

    fn usage(&self, principal: &Principal) -> String {
        if principal.has_permission(&self.others_permission) {
            "Usage: vaultkeep open <number> [player=YOU]".to_string()
        } else {
            "Usage: vaultkeep open <number>".to_string()
        }
    }

    /// Check out the target vault, or explain why not.
    async fn checkout(
        &self,
        principal: &Arc<Principal>,
        target: &Target<'_>,
    ) -> Result<std::result::Result<VaultSession, Vec<String>>> {
        let requester = Arc::clone(principal);
        let refusal = match self
            .service
            .request_vault(target.owner, target.number, requester)
            .await
        {
            Ok(session) => return Ok(Ok(session)),
            Err(AccessError::Index(CoreError::InvalidIndex { .. })) => self.usage(principal),
            Err(AccessError::Index(CoreError::InvalidOwner { reason })) => {
                format!("Invalid player name: {reason}.")
            }
            Err(AccessError::QuotaExceeded { index, .. }) => {
                format!("You don't have permission to use vault #{index}.")
            }
            Err(AccessError::PermissionDenied { .. }) => format!(
                "You don't have permission to view {}'s vault #{}.",
                target.owner, target.number
            ),
            Err(AccessError::Busy { .. }) => {
                format!("{} is already open.", capitalize(&target.describe()))
            }
            Err(err) => return Err(err).context("failed to open vault"),
        };
        Ok(Err(vec![refusal]))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[storage]
type = "file"
path = "PLACEHOLDER"
slot_count = 9

[permissions]
defaults = { "playervaults.vault.2" = true }

[permissions.players.mod]
grants = { "playervaults.others.view" = true }

[permissions.players.boss]
operator = true
grants = { "playervaults.vault.unlimited" = true }
"#;

    async fn console(dir: &tempfile::TempDir) -> Console {
        let raw = CONFIG.replace("PLACEHOLDER", &dir.path().join("vaults").display().to_string());
        let config = AppConfig::parse(&raw).unwrap();
        Console::from_config(&config).await.unwrap()
    }

    #[tokio::test]
    async fn quota_lines() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;
        assert_eq!(console.quota("steve"), vec!["steve may open 2 vaults."]);
        assert_eq!(console.quota("boss"), vec!["boss may open unlimited vaults."]);
        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn put_then_open_lists_contents() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;

        let put = console.put(1, 3, "golden_apple", None, "steve").await.unwrap();
        assert_eq!(put, vec!["Put golden_apple in slot 3 of vault #1."]);

        let lines = console.open(1, None, "steve").await.unwrap();
        assert_eq!(lines[0], "Opening vault #1...");
        assert_eq!(lines[1], "steve's Vault #1");
        assert_eq!(lines[2], "  [ 3] golden_apple");
        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn above_quota_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;
        let lines = console.open(3, None, "steve").await.unwrap();
        assert_eq!(lines, vec!["You don't have permission to use vault #3."]);
        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn viewing_others_needs_permission() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;

        let denied = console.open(1, Some("steve"), "alex").await.unwrap();
        assert_eq!(denied, vec!["You don't have permission to view steve's vault #1."]);

        let allowed = console.open(7, Some("steve"), "mod").await.unwrap();
        assert_eq!(allowed[0], "Opening steve's vault #7...");
        assert_eq!(allowed[2], "  (empty)");
        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn zero_number_prints_usage() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;
        assert_eq!(
            console.open(0, None, "steve").await.unwrap(),
            vec!["Usage: vaultkeep open <number>"]
        );
        assert_eq!(
            console.open(0, None, "mod").await.unwrap(),
            vec!["Usage: vaultkeep open <number> [player=YOU]"]
        );
        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn clear_and_out_of_range_slots() {
        let dir = tempfile::tempdir().unwrap();
        let console = console(&dir).await;

        console.put(2, 0, "torch", None, "steve").await.unwrap();
        assert_eq!(
            console.clear(2, 0, None, "steve").await.unwrap(),
            vec!["Removed torch from slot 0 of vault #2."]
        );
        assert_eq!(
            console.clear(2, 0, None, "steve").await.unwrap(),
            vec!["Slot 0 of vault #2 is already empty."]
        );
        assert_eq!(
            console.put(2, 9, "torch", None, "steve").await.unwrap(),
            vec!["Slot 9 is out of range (0-8)."]
        );
        console.shutdown().await.unwrap();
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("vault #1"), "Vault #1");
        assert_eq!(capitalize(""), "");
    }
}
