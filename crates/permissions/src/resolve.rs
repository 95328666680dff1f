//! Pure permission resolution over a loaded [`PermissionConfig`].
//!
//! Two independent checks gate every command: the requester's effective
//! level must reach the command's minimum, and the command's module must be
//! enabled in the invoking channel. Nothing here suspends or mutates.

use std::fmt;

use {
    gamehall_common::{ChannelId, GuildId, RoleId, UserId},
    gamehall_config::PermissionConfig,
    serde::{Deserialize, Serialize},
};

use crate::{catalog::CommandInfo, level::MinimumPermission};

/// Who is asking, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    pub user_id: UserId,
    /// Roles the requester holds in `guild_id`. Empty for direct messages.
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
}

impl PermissionContext {
    /// A command sent in a guild channel.
    pub fn guild(
        user_id: UserId,
        roles: impl IntoIterator<Item = RoleId>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
            guild_id: Some(guild_id),
            channel_id,
        }
    }

    /// A command sent by direct message.
    pub fn direct(user_id: UserId, channel_id: ChannelId) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
            guild_id: None,
            channel_id,
        }
    }
}

/// Outcome of resolving one command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    InsufficientLevel {
        required: MinimumPermission,
        effective: MinimumPermission,
    },
    ModuleDisabled {
        module: String,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::InsufficientLevel {
                required,
                effective,
            } => write!(f, "requires {required}, requester is {effective}"),
            Self::ModuleDisabled { module } => write!(f, "module {module} is disabled here"),
        }
    }
}

/// Highest level `ctx` earns.
pub fn effective_level(
    config: &PermissionConfig,
    owners: &[UserId],
    ctx: &PermissionContext,
) -> MinimumPermission {
    if owners.contains(&ctx.user_id) {
        return MinimumPermission::BotOwner;
    }
    let Some(guild_id) = ctx.guild_id else {
        return MinimumPermission::Everyone;
    };
    let Some(guild) = config.guild(guild_id) else {
        return MinimumPermission::Everyone;
    };
    if guild.owner_id == ctx.user_id {
        return MinimumPermission::GuildOwner;
    }
    let holds = |role: Option<RoleId>| role.is_some_and(|r| ctx.roles.contains(&r));
    if holds(guild.admin_role) || holds(guild.mod_role) {
        return MinimumPermission::ModRole;
    }
    if config.is_special_user(ctx.channel_id, ctx.user_id) {
        return MinimumPermission::Special;
    }
    MinimumPermission::Everyone
}

/// Whether `module` may run in the context's channel. A channel entry wins
/// over a guild entry; with neither, the module is enabled. Direct messages
/// have no module lists.
pub fn module_enabled(config: &PermissionConfig, ctx: &PermissionContext, module: &str) -> bool {
    let Some(guild_id) = ctx.guild_id else {
        return true;
    };
    config
        .channel_module_state(ctx.channel_id, module)
        .or_else(|| config.guild_module_state(guild_id, module))
        .is_none_or(|state| state.is_enabled())
}

pub fn resolve(
    config: &PermissionConfig,
    owners: &[UserId],
    ctx: &PermissionContext,
    command: &CommandInfo,
) -> Decision {
    let effective = effective_level(config, owners, ctx);
    if effective < command.required {
        return Decision::InsufficientLevel {
            required: command.required,
            effective,
        };
    }
    if !module_enabled(config, ctx, &command.module) {
        return Decision::ModuleDisabled {
            module: command.module.clone(),
        };
    }
    Decision::Allowed
}
