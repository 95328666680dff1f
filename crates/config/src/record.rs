//! Persisted permission records.
//!
//! One [`GuildRecord`] per known guild holding the admin/mod roles, the
//! guild-wide module list, and one [`ChannelRecord`] per channel with its
//! special users and channel-level module list. Module names are stored
//! lowercased so lookups are case-insensitive.

use std::collections::{BTreeMap, BTreeSet};

use {
    gamehall_common::{ChannelId, GuildId, RoleId, UserId},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Explicit module entry at channel or guild scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Whitelisted,
    Blacklisted,
}

impl ModuleState {
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Whitelisted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(default)]
    pub special_users: BTreeSet<UserId>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRecord {
    #[serde(default)]
    pub name: String,
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_role: Option<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fancy_help: Option<bool>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleState>,
    #[serde(default)]
    pub channels: BTreeMap<ChannelId, ChannelRecord>,
    #[serde(default)]
    pub users: BTreeSet<UserId>,
}

impl GuildRecord {
    fn new(owner_id: UserId, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner_id,
            admin_role: None,
            mod_role: None,
            fancy_help: None,
            modules: BTreeMap::new(),
            channels: BTreeMap::new(),
            users: BTreeSet::new(),
        }
    }
}

/// The full permission document as loaded from a [`ConfigStore`].
///
/// [`ConfigStore`]: crate::store::ConfigStore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default)]
    pub guilds: BTreeMap<GuildId, GuildRecord>,
}

/// Canonical form of a module name: trimmed, Unicode-lowercased. Two names
/// refer to the same module iff their keys match.
pub fn module_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Discord convention: the everyone role shares the guild's id.
fn everyone_role(guild_id: GuildId) -> RoleId {
    RoleId(guild_id.get())
}

impl PermissionConfig {
    // ── topology ────────────────────────────────────────────────────────────

    /// Start tracking a guild. Returns false if it was already known; the
    /// existing record is kept, except the owner, which is refreshed.
    pub fn add_new_guild(&mut self, guild_id: GuildId, owner_id: UserId, name: &str) -> bool {
        match self.guilds.get_mut(&guild_id) {
            Some(existing) => {
                existing.owner_id = owner_id;
                false
            },
            None => {
                self.guilds
                    .insert(guild_id, GuildRecord::new(owner_id, name));
                true
            },
        }
    }

    pub fn add_user(&mut self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        Ok(self.guild_mut(guild_id)?.users.insert(user_id))
    }

    pub fn add_channel(&mut self, guild_id: GuildId, channel_id: ChannelId) -> Result<bool> {
        let guild = self.guild_mut(guild_id)?;
        if guild.channels.contains_key(&channel_id) {
            return Ok(false);
        }
        guild.channels.insert(channel_id, ChannelRecord::default());
        Ok(true)
    }

    /// Forget a channel together with its special users and module entries.
    pub fn remove_channel(&mut self, channel_id: ChannelId) -> bool {
        self.guilds
            .values_mut()
            .any(|guild| guild.channels.remove(&channel_id).is_some())
    }

    pub fn guild(&self, guild_id: GuildId) -> Option<&GuildRecord> {
        self.guilds.get(&guild_id)
    }

    /// Guild owning `channel_id`, if the channel is tracked.
    pub fn guild_of_channel(&self, channel_id: ChannelId) -> Option<GuildId> {
        self.guilds
            .iter()
            .find(|(_, guild)| guild.channels.contains_key(&channel_id))
            .map(|(id, _)| *id)
    }

    pub fn channel(&self, channel_id: ChannelId) -> Option<&ChannelRecord> {
        self.guilds
            .values()
            .find_map(|guild| guild.channels.get(&channel_id))
    }

    fn guild_mut(&mut self, guild_id: GuildId) -> Result<&mut GuildRecord> {
        self.guilds
            .get_mut(&guild_id)
            .ok_or(Error::UnknownGuild { guild_id })
    }

    fn channel_mut(&mut self, channel_id: ChannelId) -> Result<&mut ChannelRecord> {
        self.guilds
            .values_mut()
            .find_map(|guild| guild.channels.get_mut(&channel_id))
            .ok_or(Error::UnknownChannel { channel_id })
    }

    // ── roles ───────────────────────────────────────────────────────────────

    pub fn admin_role(&self, guild_id: GuildId) -> Option<RoleId> {
        self.guild(guild_id).and_then(|g| g.admin_role)
    }

    pub fn mod_role(&self, guild_id: GuildId) -> Option<RoleId> {
        self.guild(guild_id).and_then(|g| g.mod_role)
    }

    /// Returns false when `role_id` already was the admin role.
    pub fn set_guild_admin_role(&mut self, guild_id: GuildId, role_id: RoleId) -> Result<bool> {
        if role_id == everyone_role(guild_id) {
            return Err(Error::InvalidRoleAssignment {
                role_id,
                slot: "admin",
            });
        }
        let guild = self.guild_mut(guild_id)?;
        Ok(guild.admin_role.replace(role_id) != Some(role_id))
    }

    /// Returns false when `role_id` already was the mod role.
    pub fn set_guild_mod_role(&mut self, guild_id: GuildId, role_id: RoleId) -> Result<bool> {
        if role_id == everyone_role(guild_id) {
            return Err(Error::InvalidRoleAssignment {
                role_id,
                slot: "mod",
            });
        }
        let guild = self.guild_mut(guild_id)?;
        Ok(guild.mod_role.replace(role_id) != Some(role_id))
    }

    // ── special users ───────────────────────────────────────────────────────

    pub fn is_special_user(&self, channel_id: ChannelId, user_id: UserId) -> bool {
        self.channel(channel_id)
            .is_some_and(|ch| ch.special_users.contains(&user_id))
    }

    pub fn special_users(&self, channel_id: ChannelId) -> Vec<UserId> {
        self.channel(channel_id)
            .map(|ch| ch.special_users.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn add_special_user(&mut self, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
        Ok(self.channel_mut(channel_id)?.special_users.insert(user_id))
    }

    pub fn remove_special_user(&mut self, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
        Ok(self.channel_mut(channel_id)?.special_users.remove(&user_id))
    }

    // ── modules ─────────────────────────────────────────────────────────────

    pub fn channel_module_state(&self, channel_id: ChannelId, module: &str) -> Option<ModuleState> {
        self.channel(channel_id)
            .and_then(|ch| ch.modules.get(&module_key(module)).copied())
    }

    pub fn guild_module_state(&self, guild_id: GuildId, module: &str) -> Option<ModuleState> {
        self.guild(guild_id)
            .and_then(|g| g.modules.get(&module_key(module)).copied())
    }

    /// Returns false when the channel already had that exact entry.
    pub fn set_channel_module(
        &mut self,
        channel_id: ChannelId,
        module: &str,
        state: ModuleState,
    ) -> Result<bool> {
        let channel = self.channel_mut(channel_id)?;
        Ok(channel.modules.insert(module_key(module), state) != Some(state))
    }

    /// Returns false when the guild already had that exact entry.
    pub fn set_guild_module(
        &mut self,
        guild_id: GuildId,
        module: &str,
        state: ModuleState,
    ) -> Result<bool> {
        let guild = self.guild_mut(guild_id)?;
        Ok(guild.modules.insert(module_key(module), state) != Some(state))
    }

    pub fn whitelist_module(&mut self, channel_id: ChannelId, module: &str) -> Result<bool> {
        self.set_channel_module(channel_id, module, ModuleState::Whitelisted)
    }

    pub fn blacklist_module(&mut self, channel_id: ChannelId, module: &str) -> Result<bool> {
        self.set_channel_module(channel_id, module, ModuleState::Blacklisted)
    }

    pub fn whitelist_module_guild(&mut self, guild_id: GuildId, module: &str) -> Result<bool> {
        self.set_guild_module(guild_id, module, ModuleState::Whitelisted)
    }

    pub fn blacklist_module_guild(&mut self, guild_id: GuildId, module: &str) -> Result<bool> {
        self.set_guild_module(guild_id, module, ModuleState::Blacklisted)
    }

    // ── help ────────────────────────────────────────────────────────────────

    /// Guild's fancy-help flag, falling back to `default` when never set.
    pub fn fancy_help(&self, guild_id: GuildId, default: bool) -> bool {
        self.guild(guild_id)
            .and_then(|g| g.fancy_help)
            .unwrap_or(default)
    }

    pub fn set_fancy_help(&mut self, guild_id: GuildId, enabled: bool) -> Result<bool> {
        let guild = self.guild_mut(guild_id)?;
        Ok(guild.fancy_help.replace(enabled) != Some(enabled))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId(100);
    const CHAN: ChannelId = ChannelId(200);

    fn seeded() -> PermissionConfig {
        let mut cfg = PermissionConfig::default();
        assert!(cfg.add_new_guild(GUILD, UserId(1), "test guild"));
        assert!(cfg.add_channel(GUILD, CHAN).unwrap());
        cfg
    }

    #[test]
    fn add_new_guild_is_idempotent_but_refreshes_owner() {
        let mut cfg = seeded();
        cfg.set_guild_admin_role(GUILD, RoleId(5)).unwrap();

        assert!(!cfg.add_new_guild(GUILD, UserId(9), "renamed"));
        let guild = cfg.guild(GUILD).unwrap();
        assert_eq!(guild.owner_id, UserId(9));
        assert_eq!(guild.admin_role, Some(RoleId(5)));
    }

    #[test]
    fn everyone_role_is_rejected_for_admin_and_mod() {
        let mut cfg = seeded();
        let everyone = RoleId(GUILD.get());
        assert!(matches!(
            cfg.set_guild_admin_role(GUILD, everyone),
            Err(Error::InvalidRoleAssignment { slot: "admin", .. })
        ));
        assert!(matches!(
            cfg.set_guild_mod_role(GUILD, everyone),
            Err(Error::InvalidRoleAssignment { slot: "mod", .. })
        ));
        assert_eq!(cfg.admin_role(GUILD), None);
    }

    #[test]
    fn setting_same_role_twice_reports_no_change() {
        let mut cfg = seeded();
        assert!(cfg.set_guild_mod_role(GUILD, RoleId(7)).unwrap());
        assert!(!cfg.set_guild_mod_role(GUILD, RoleId(7)).unwrap());
    }

    #[test]
    fn unknown_targets_error() {
        let mut cfg = PermissionConfig::default();
        assert!(matches!(
            cfg.set_guild_admin_role(GUILD, RoleId(5)),
            Err(Error::UnknownGuild { .. })
        ));
        assert!(matches!(
            cfg.add_special_user(CHAN, UserId(3)),
            Err(Error::UnknownChannel { .. })
        ));
    }

    #[test]
    fn module_entries_are_case_insensitive_and_overwrite() {
        let mut cfg = seeded();
        cfg.whitelist_module(CHAN, "Trivia").unwrap();
        assert_eq!(
            cfg.channel_module_state(CHAN, "trivia"),
            Some(ModuleState::Whitelisted)
        );
        cfg.blacklist_module(CHAN, "TRIVIA").unwrap();
        assert_eq!(
            cfg.channel_module_state(CHAN, "Trivia"),
            Some(ModuleState::Blacklisted)
        );
        assert_eq!(cfg.guild_module_state(GUILD, "trivia"), None);
    }

    #[test]
    fn removing_channel_drops_its_entries() {
        let mut cfg = seeded();
        cfg.add_special_user(CHAN, UserId(3)).unwrap();
        cfg.blacklist_module(CHAN, "games").unwrap();

        assert!(cfg.remove_channel(CHAN));
        assert!(!cfg.is_special_user(CHAN, UserId(3)));
        assert_eq!(cfg.channel_module_state(CHAN, "games"), None);
        assert!(!cfg.remove_channel(CHAN));
    }

    #[test]
    fn fancy_help_falls_back_to_default() {
        let mut cfg = seeded();
        assert!(cfg.fancy_help(GUILD, true));
        cfg.set_fancy_help(GUILD, false).unwrap();
        assert!(!cfg.fancy_help(GUILD, true));
    }

    #[test]
    fn json_round_trip_keeps_numeric_keys() {
        let mut cfg = seeded();
        cfg.add_special_user(CHAN, UserId(3)).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PermissionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(back.guild_of_channel(CHAN), Some(GUILD));
    }
}
