//! Permission service: command gating, admin operations, help, and
//! guild topology bookkeeping.

use std::sync::Arc;

use {
    async_trait::async_trait,
    gamehall_channels::{ChannelOutbound, EventBus, EventHandler, InboundEvent},
    gamehall_common::{ChannelId, GuildId, MessageId, RoleId, UserId},
    gamehall_config::{BotConfig, ConfigTransactor, HelpConfig, ModuleState, PermissionConfig},
    gamehall_sessions::SessionRegistry,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    catalog::{CommandInfo, ModuleCatalog, PERMISSIONS_MODULE},
    help::{self, HelpPagination},
    resolve::{self, Decision, PermissionContext},
};

/// Platform permissions a user (or the bot) has in one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccess {
    pub read_messages: bool,
    pub send_messages: bool,
    pub add_reactions: bool,
    pub manage_messages: bool,
}

impl ChannelAccess {
    pub const FULL: Self = Self {
        read_messages: true,
        send_messages: true,
        add_reactions: true,
        manage_messages: true,
    };

    pub fn can_converse(self) -> bool {
        self.read_messages && self.send_messages
    }

    /// Needed to run a reaction-driven display.
    pub fn can_paginate(self) -> bool {
        self.add_reactions && self.manage_messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleScope {
    Channel(ChannelId),
    Guild(GuildId),
}

/// How a help request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpReply {
    Plain(MessageId),
    Paginated(MessageId),
}

pub struct PermissionsService {
    transactor: Arc<ConfigTransactor>,
    catalog: ModuleCatalog,
    owners: Vec<UserId>,
    bot_user: Option<UserId>,
    help: HelpConfig,
    help_sessions: SessionRegistry<HelpPagination>,
}

impl PermissionsService {
    pub fn new(
        transactor: Arc<ConfigTransactor>,
        catalog: ModuleCatalog,
        bot: &BotConfig,
        help: HelpConfig,
        bus: EventBus,
    ) -> Self {
        info!(
            modules = catalog.modules().len(),
            owners = bot.owners.len(),
            "permission service created"
        );
        Self {
            transactor,
            catalog,
            owners: bot.owners.clone(),
            bot_user: bot.user_id,
            help,
            help_sessions: SessionRegistry::new("help", bus),
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn transactor(&self) -> &Arc<ConfigTransactor> {
        &self.transactor
    }

    pub fn help_sessions(&self) -> &SessionRegistry<HelpPagination> {
        &self.help_sessions
    }

    async fn snapshot(&self) -> Result<PermissionConfig> {
        Ok(self.transactor.read().await?)
    }

    // ── gating ──────────────────────────────────────────────────────────────

    pub async fn resolve(&self, ctx: &PermissionContext, command: &CommandInfo) -> Result<Decision> {
        let config = self.snapshot().await?;
        Ok(resolve::resolve(&config, &self.owners, ctx, command))
    }

    /// The yes/no the command framework checks before running a handler.
    /// Store failures decline.
    pub async fn may_proceed(&self, ctx: &PermissionContext, command: &CommandInfo) -> bool {
        match self.resolve(ctx, command).await {
            Ok(decision) => {
                if !decision.is_allowed() {
                    debug!(command = %command.name, user = %ctx.user_id, %decision, "command declined");
                }
                decision.is_allowed()
            },
            Err(e) => {
                warn!(command = %command.name, error = %e, "permission check failed");
                false
            },
        }
    }

    /// Like [`Self::may_proceed`], but a decline is an
    /// [`Error::PermissionDenied`].
    pub async fn check(&self, ctx: &PermissionContext, command: &CommandInfo) -> Result<()> {
        match self.resolve(ctx, command).await? {
            Decision::Allowed => Ok(()),
            decision => Err(Error::denied(&command.name, decision)),
        }
    }

    // ── admin operations ────────────────────────────────────────────────────

    pub async fn set_admin_role(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool> {
        let changed = self
            .transactor
            .mutate("set_guild_admin_role", |cfg| {
                cfg.set_guild_admin_role(guild_id, role_id)
            })
            .await?;
        info!(guild_id = %guild_id, role_id = %role_id, changed, "admin role set");
        Ok(changed)
    }

    pub async fn set_mod_role(&self, guild_id: GuildId, role_id: RoleId) -> Result<bool> {
        let changed = self
            .transactor
            .mutate("set_guild_mod_role", |cfg| cfg.set_guild_mod_role(guild_id, role_id))
            .await?;
        info!(guild_id = %guild_id, role_id = %role_id, changed, "mod role set");
        Ok(changed)
    }

    /// Grant special privileges in `channel_id`. The target must be able to
    /// read and send there.
    pub async fn add_special_user(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        access: ChannelAccess,
    ) -> Result<bool> {
        if !access.can_converse() {
            return Err(Error::NoChannelAccess {
                user_id,
                channel_id,
            });
        }
        let added = self
            .transactor
            .mutate("add_special_user", |cfg| cfg.add_special_user(channel_id, user_id))
            .await?;
        info!(channel_id = %channel_id, user_id = %user_id, added, "special user added");
        Ok(added)
    }

    pub async fn remove_special_user(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool> {
        let removed = self
            .transactor
            .mutate("remove_special_user", |cfg| {
                cfg.remove_special_user(channel_id, user_id)
            })
            .await?;
        info!(channel_id = %channel_id, user_id = %user_id, removed, "special user removed");
        Ok(removed)
    }

    pub async fn whitelist_module(&self, scope: ModuleScope, module: &str) -> Result<bool> {
        self.set_module(scope, module, ModuleState::Whitelisted).await
    }

    pub async fn blacklist_module(&self, scope: ModuleScope, module: &str) -> Result<bool> {
        self.set_module(scope, module, ModuleState::Blacklisted).await
    }

    async fn set_module(&self, scope: ModuleScope, module: &str, state: ModuleState) -> Result<bool> {
        let name = self
            .catalog
            .module(module)
            .map(|m| m.name.clone())
            .ok_or_else(|| Error::UnknownModule {
                name: module.to_string(),
            })?;
        if state == ModuleState::Blacklisted && name == PERMISSIONS_MODULE {
            return Err(Error::ProtectedModule { name });
        }
        let changed = self
            .transactor
            .mutate("set_module", |cfg| match scope {
                ModuleScope::Channel(channel_id) => cfg.set_channel_module(channel_id, &name, state),
                ModuleScope::Guild(guild_id) => cfg.set_guild_module(guild_id, &name, state),
            })
            .await?;
        info!(module = %name, ?scope, ?state, changed, "module state set");
        Ok(changed)
    }

    /// Numbered listing of the modules that can be whitelisted or
    /// blacklisted. The built-in permissions module is left out.
    pub fn list_modules(&self) -> String {
        let mut out = String::from("All loaded modules:\n```\n");
        for (index, name) in self.catalog.toggleable_names().iter().enumerate() {
            out.push_str(&format!("{:>3}: {name}\n", index + 1));
        }
        out.push_str("```");
        out
    }

    pub async fn set_fancy_help(&self, guild_id: GuildId, enabled: bool) -> Result<bool> {
        let changed = self
            .transactor
            .mutate("set_fancy_help", |cfg| cfg.set_fancy_help(guild_id, enabled))
            .await?;
        info!(guild_id = %guild_id, enabled, changed, "fancy help set");
        Ok(changed)
    }

    // ── help ────────────────────────────────────────────────────────────────

    fn visible_in<'a>(&'a self, config: &PermissionConfig, ctx: &PermissionContext) -> Vec<&'a CommandInfo> {
        self.catalog
            .commands()
            .filter(|command| !command.hidden)
            .filter(|command| resolve::resolve(config, &self.owners, ctx, command).is_allowed())
            .collect()
    }

    fn fancy_in(&self, config: &PermissionConfig, ctx: &PermissionContext, bot_access: ChannelAccess) -> bool {
        ctx.guild_id
            .is_some_and(|guild_id| config.fancy_help(guild_id, self.help.fancy_by_default))
            && bot_access.can_paginate()
    }

    /// Non-hidden commands `ctx` may run here.
    pub async fn visible_commands(&self, ctx: &PermissionContext) -> Result<Vec<CommandInfo>> {
        let config = self.snapshot().await?;
        Ok(self
            .visible_in(&config, ctx)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Fancy help needs a guild that enabled it and a bot that can add
    /// reactions and manage messages in the channel.
    pub async fn use_fancy_help(&self, ctx: &PermissionContext, bot_access: ChannelAccess) -> Result<bool> {
        let config = self.snapshot().await?;
        Ok(self.fancy_in(&config, ctx, bot_access))
    }

    /// Answer a help request, either as one message or as a paginated
    /// display registered under its message id.
    pub async fn help(
        &self,
        ctx: &PermissionContext,
        bot_access: ChannelAccess,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Result<HelpReply> {
        let config = self.snapshot().await?;
        let commands = self.visible_in(&config, ctx);

        if self.fancy_in(&config, ctx, bot_access) {
            let pages = help::pages(&commands, self.help.page_size);
            let session =
                HelpPagination::open(outbound, ctx.channel_id, ctx.user_id, self.bot_user, pages).await?;
            let message = session.message();
            self.help_sessions.register(session.key(), session)?;
            return Ok(HelpReply::Paginated(message));
        }

        let message = outbound
            .send_text(ctx.channel_id, &help::plain_listing(&commands))
            .await?;
        Ok(HelpReply::Plain(message))
    }

    /// Details for one command, if `ctx` may see it.
    pub async fn command_help(&self, ctx: &PermissionContext, name: &str) -> Result<Option<String>> {
        let config = self.snapshot().await?;
        let matching: Vec<&CommandInfo> = self
            .visible_in(&config, ctx)
            .into_iter()
            .filter(|command| command.answers_to(name))
            .collect();
        let Some(first) = matching.first() else {
            return Ok(None);
        };
        let mut out = format!("`{}`\n", first.name);
        for command in &matching {
            out.push_str(&format!("\t{}\n", command.summary));
        }
        Ok(Some(out))
    }

    // ── topology ────────────────────────────────────────────────────────────

    /// Record guild/channel/user topology changes. Returns whether the store
    /// changed. Events about unknown guilds are skipped.
    pub async fn apply_topology(&self, event: &InboundEvent) -> Result<bool> {
        let changed = match event {
            InboundEvent::GuildAvailable(guild) => {
                self.transactor
                    .mutate("add_new_guild", |cfg| {
                        let mut changed = cfg.add_new_guild(guild.id, guild.owner_id, &guild.name);
                        for channel_id in &guild.channels {
                            changed |= cfg.add_channel(guild.id, *channel_id)?;
                        }
                        for user_id in &guild.members {
                            changed |= cfg.add_user(guild.id, *user_id)?;
                        }
                        Ok(changed)
                    })
                    .await?
            },
            InboundEvent::UserJoined(member) => {
                self.transactor
                    .mutate("add_user", |cfg| {
                        if cfg.guild(member.guild_id).is_none() {
                            return Ok(false);
                        }
                        cfg.add_user(member.guild_id, member.user.id)
                    })
                    .await?
            },
            InboundEvent::ChannelCreated(channel) => {
                let Some(guild_id) = channel.guild_id else {
                    return Ok(false);
                };
                self.transactor
                    .mutate("add_channel", |cfg| {
                        if cfg.guild(guild_id).is_none() {
                            return Ok(false);
                        }
                        cfg.add_channel(guild_id, channel.id)
                    })
                    .await?
            },
            InboundEvent::ChannelDestroyed(channel) => {
                self.transactor
                    .mutate("remove_channel", |cfg| Ok(cfg.remove_channel(channel.id)))
                    .await?
            },
            _ => return Ok(false),
        };
        if changed {
            info!(event = event.kind(), "topology recorded");
        }
        Ok(changed)
    }
}

#[async_trait]
impl EventHandler for PermissionsService {
    async fn handle(&self, event: &InboundEvent) {
        if let Err(e) = self.apply_topology(event).await {
            warn!(event = event.kind(), error = %e, "failed to record topology change");
        }
    }
}
