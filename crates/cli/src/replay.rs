//! Offline replay of recorded platform events.
//!
//! Each line of the recording is published on an [`EventBus`] with the
//! permission service subscribed for topology bookkeeping, so live sessions
//! (help displays, trivia rounds) see the events exactly as they would in
//! production. Prefixed messages are then dispatched as commands through the
//! permission gate. Every outbound side effect is captured by a
//! [`RecordingOutbound`].

use std::{path::Path, str::FromStr, sync::Arc};

use {
    anyhow::Result,
    gamehall_channels::{
        ChannelOutbound, EventBus, EventHandler, InboundEvent, InboundMessage, OutboundAction,
        RecordingOutbound, Subscription,
    },
    gamehall_common::{ChannelId, GuildId, RoleId, UserId},
    gamehall_config::{ConfigStore, ConfigTransactor, GamehallConfig, JsonFileStore},
    gamehall_games::{TriviaData, TriviaService, load_questions},
    gamehall_permissions::{
        ChannelAccess, CommandInfo, MinimumPermission, ModuleCatalog, ModuleInfo, ModuleScope,
        PermissionContext, PermissionsService,
    },
    tracing::{debug, info, warn},
};

pub const GAMES_MODULE: &str = "Games";

/// Commands the replay router understands, on top of the built-in ones.
pub fn catalog() -> Result<ModuleCatalog> {
    let games = ModuleInfo::new(GAMES_MODULE)
        .command(
            CommandInfo::new("trivia", "", MinimumPermission::Everyone)
                .summary("Start a trivia round in this channel."),
        )
        .command(
            CommandInfo::new("stoptrivia", "", MinimumPermission::ModRole)
                .summary("Stop the trivia round in this channel.")
                .alias("tstop"),
        )
        .command(
            CommandInfo::new("score", "", MinimumPermission::Everyone)
                .summary("Show the scores of the running trivia round."),
        );
    Ok(ModuleCatalog::new([games])?)
}

/// What a replay did.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub events: usize,
    pub skipped: usize,
    pub actions: Vec<OutboundAction>,
}

impl ReplaySummary {
    /// One human-readable line per outbound action.
    pub fn transcript(&self) -> Vec<String> {
        self.actions.iter().map(describe).collect()
    }
}

fn describe(action: &OutboundAction) -> String {
    match action {
        OutboundAction::Sent {
            channel,
            message,
            text,
        } => format!("#{channel} [{message}] {text}"),
        OutboundAction::Direct {
            user,
            message,
            text,
        } => format!("@{user} [{message}] {text}"),
        OutboundAction::Edited {
            channel,
            message,
            text,
        } => format!("#{channel} [{message}] (edited) {text}"),
        OutboundAction::Deleted { channel, message } => format!("#{channel} [{message}] (deleted)"),
        OutboundAction::ReactionAdded { message, emoji } => format!("[{message}] +{emoji}"),
        OutboundAction::ReactionRemoved {
            message,
            user,
            emoji,
        } => format!("[{message}] -{emoji} (@{user})"),
    }
}

/// Feeds events into the bus and the command router.
pub struct Replayer {
    prefix: String,
    bus: EventBus,
    permissions: Arc<PermissionsService>,
    trivia: Option<TriviaService>,
    outbound: Arc<RecordingOutbound>,
    summary: ReplaySummary,
    _topology: Subscription,
}

impl Replayer {
    pub fn new(
        config: &GamehallConfig,
        store: Arc<dyn ConfigStore>,
        trivia: Option<TriviaData>,
    ) -> Result<Self> {
        let bus = EventBus::new();
        let outbound = Arc::new(RecordingOutbound::new());
        let permissions = Arc::new(PermissionsService::new(
            Arc::new(ConfigTransactor::new(store)),
            catalog()?,
            &config.bot,
            config.help.clone(),
            bus.clone(),
        ));
        let topology = bus.subscribe(Arc::clone(&permissions) as Arc<dyn EventHandler>);
        let trivia = trivia.map(|data| {
            TriviaService::new(
                data,
                config.trivia.clone(),
                bus.clone(),
                Arc::clone(&outbound) as Arc<dyn ChannelOutbound>,
            )
        });
        Ok(Self {
            prefix: config.bot.command_prefix.clone(),
            bus,
            permissions,
            trivia,
            outbound,
            summary: ReplaySummary::default(),
            _topology: topology,
        })
    }

    /// Parse and feed one recorded line. Blank or malformed lines are
    /// counted as skipped.
    pub async fn feed_line(&mut self, number: usize, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match InboundEvent::from_json_line(line) {
            Ok(event) => self.feed(&event).await,
            Err(e) => {
                warn!(line = number, error = %e, "skipping unreadable event");
                self.summary.skipped += 1;
            },
        }
    }

    pub async fn feed(&mut self, event: &InboundEvent) {
        self.summary.events += 1;
        let delivered = self.bus.publish(event).await;
        debug!(event = event.kind(), delivered, "event published");

        if let InboundEvent::MessageReceived(message) = event
            && let Some(invocation) = message.content.strip_prefix(self.prefix.as_str())
        {
            let mut words = invocation.split_whitespace();
            if let Some(name) = words.next() {
                let args: Vec<&str> = words.collect();
                if let Err(e) = self.run_command(message, name, &args).await {
                    warn!(command = name, channel = %message.channel_id, error = %e, "command failed");
                }
            }
        }
    }

    async fn run_command(&self, message: &InboundMessage, name: &str, args: &[&str]) -> Result<()> {
        let Some(command) = self.permissions.catalog().command(name) else {
            debug!(command = name, "unknown command");
            return Ok(());
        };
        let guild = message.guild_id.filter(|_| !message.is_direct);
        let ctx = match guild {
            Some(guild_id) => PermissionContext::guild(
                message.author.id,
                message.roles.iter().copied(),
                guild_id,
                message.channel_id,
            ),
            None => PermissionContext::direct(message.author.id, message.channel_id),
        };
        let outbound = Arc::clone(&self.outbound) as Arc<dyn ChannelOutbound>;

        if !self.permissions.may_proceed(&ctx, command).await {
            debug!(command = %command.name, user = %message.author.id, "command declined");
            return Ok(());
        }

        match command.name.as_str() {
            "help" => match args.first() {
                Some(topic) => {
                    let text = self
                        .permissions
                        .command_help(&ctx, topic)
                        .await?
                        .unwrap_or_else(|| format!("No command named `{topic}`."));
                    outbound.send_text(message.channel_id, &text).await?;
                },
                None => {
                    self.permissions
                        .help(&ctx, ChannelAccess::FULL, outbound)
                        .await?;
                },
            },
            "modules" => {
                outbound
                    .send_text(message.channel_id, &self.permissions.list_modules())
                    .await?;
            },
            "setadmin" | "setmod" | "addspecial" | "remspecial" | "whitelist" | "blacklist"
            | "fancyhelp" => {
                let Some(guild_id) = guild else {
                    debug!(command = %command.name, "guild command outside a guild");
                    return Ok(());
                };
                let reply = match self
                    .run_admin(&command.name, args, guild_id, message.channel_id)
                    .await
                {
                    Ok(reply) => reply,
                    Err(e) => refusal(&e).ok_or(e)?,
                };
                outbound.send_text(message.channel_id, &reply).await?;
            },
            "trivia" | "stoptrivia" | "score" => {
                let Some(trivia) = &self.trivia else {
                    outbound
                        .send_text(message.channel_id, "Trivia is not available.")
                        .await?;
                    return Ok(());
                };
                self.run_trivia(trivia, &command.name, message).await?;
            },
            other => debug!(command = other, "command has no replay handler"),
        }
        Ok(())
    }

    /// Guild administration commands. Returns the reply to post.
    async fn run_admin(
        &self,
        name: &str,
        args: &[&str],
        guild_id: GuildId,
        channel: ChannelId,
    ) -> gamehall_permissions::Result<String> {
        let target = args.first().copied().unwrap_or_default();
        let reply = match name {
            "setadmin" | "setmod" => {
                let Some(role) = mentioned::<RoleId>(target) else {
                    return Ok(format!("`{target}` is not a role."));
                };
                let slot = if name == "setadmin" {
                    self.permissions.set_admin_role(guild_id, role).await?;
                    "admin"
                } else {
                    self.permissions.set_mod_role(guild_id, role).await?;
                    "mod"
                };
                format!("Set **{role}** as the {slot} role for this server.")
            },
            "addspecial" => {
                let Some(user) = mentioned::<UserId>(target) else {
                    return Ok(format!("`{target}` is not a user."));
                };
                self.permissions
                    .add_special_user(channel, user, ChannelAccess::FULL)
                    .await?;
                format!("Gave **{user}** Special command privileges.")
            },
            "remspecial" => {
                let Some(user) = mentioned::<UserId>(target) else {
                    return Ok(format!("`{target}` is not a user."));
                };
                self.permissions.remove_special_user(channel, user).await?;
                format!("Removed **{user}** Special command privileges.")
            },
            "whitelist" | "blacklist" => {
                let (scope, place) = match args.get(1) {
                    Some(flag) if is_guild_wide(flag) => (ModuleScope::Guild(guild_id), "server"),
                    _ => (ModuleScope::Channel(channel), "channel"),
                };
                if name == "whitelist" {
                    self.permissions.whitelist_module(scope, target).await?;
                } else {
                    self.permissions.blacklist_module(scope, target).await?;
                }
                let module = self
                    .permissions
                    .catalog()
                    .module(target)
                    .map_or(target, |m| m.name.as_str());
                format!("Module `{module}` is now {name}ed in this {place}.")
            },
            _ => {
                let enabled = match target.to_ascii_lowercase().as_str() {
                    "on" | "true" | "yes" => true,
                    "off" | "false" | "no" => false,
                    _ => return Ok("Use `on` or `off`.".into()),
                };
                self.permissions.set_fancy_help(guild_id, enabled).await?;
                let state = if enabled { "on" } else { "off" };
                format!("Fancy help is now {state} for this server.")
            },
        };
        Ok(reply)
    }

    async fn run_trivia(
        &self,
        trivia: &TriviaService,
        name: &str,
        message: &InboundMessage,
    ) -> Result<()> {
        let channel = message.channel_id;
        match name {
            "trivia" => match trivia.start(channel).await {
                Err(e) if e.is_already_active() => {
                    self.outbound
                        .send_text(channel, "A trivia round is already running here.")
                        .await?;
                },
                other => other?,
            },
            "stoptrivia" => {
                if !trivia.stop(channel).await? {
                    self.outbound
                        .send_text(channel, "No trivia round is running here.")
                        .await?;
                }
            },
            _ => {
                let text = trivia
                    .scoreboard(channel)
                    .await
                    .unwrap_or_else(|| "No trivia round is running here.".into());
                self.outbound.send_text(channel, &text).await?;
            },
        }
        Ok(())
    }

    pub fn finish(mut self) -> ReplaySummary {
        self.summary.actions = self.outbound.actions();
        self.summary
    }
}

/// Reply for an admin command the store refused.
fn refusal(err: &gamehall_permissions::Error) -> Option<String> {
    use gamehall_permissions::Error;

    match err {
        Error::InvalidRoleAssignment { slot, .. } => {
            Some(format!("Not allowed to set `everyone` as the {slot} role."))
        },
        Error::UnknownModule { name } => Some(format!("No module named `{name}`.")),
        Error::ProtectedModule { name } => Some(format!("Not allowed to blacklist {name}.")),
        Error::NoChannelAccess { .. } => {
            Some("That user has no read/write permissions in this channel.".into())
        },
        _ => None,
    }
}

/// Accepts a bare id or a mention such as `<@&300>` or `<@!5>`.
fn mentioned<T: FromStr>(word: &str) -> Option<T> {
    word.trim_start_matches(['<', '@', '!', '&'])
        .trim_end_matches('>')
        .parse()
        .ok()
}

fn is_guild_wide(flag: &str) -> bool {
    matches!(
        flag.to_ascii_lowercase().as_str(),
        "true" | "yes" | "guild" | "server"
    )
}

/// Replay `events` against the configured permission store.
pub async fn replay_file(
    config: &GamehallConfig,
    events: &Path,
    trivia: Option<&Path>,
) -> Result<ReplaySummary> {
    let data = trivia.map(load_questions).transpose()?;
    let store = Arc::new(JsonFileStore::new(config.store.resolved_path()));
    let mut replayer = Replayer::new(config, store, data)?;

    let raw = tokio::fs::read_to_string(events).await?;
    for (index, line) in raw.lines().enumerate() {
        replayer.feed_line(index + 1, line).await;
    }
    let summary = replayer.finish();
    info!(
        events = summary.events,
        skipped = summary.skipped,
        actions = summary.actions.len(),
        "replay finished"
    );
    Ok(summary)
}
