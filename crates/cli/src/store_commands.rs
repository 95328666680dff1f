use std::sync::Arc;

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    gamehall_channels::EventBus,
    gamehall_common::{GuildId, RoleId},
    gamehall_config::{ConfigTransactor, GamehallConfig, JsonFileStore},
    gamehall_permissions::PermissionsService,
    tracing::info,
};

#[derive(Subcommand)]
pub enum StoreAction {
    /// Print the stored record of a guild as JSON.
    Show { guild: GuildId },
    /// List the guilds the store knows about.
    Guilds,
    /// Set the admin role of a guild.
    SetAdmin { guild: GuildId, role: RoleId },
    /// Set the mod role of a guild.
    SetMod { guild: GuildId, role: RoleId },
}

/// Permission service over the configured JSON store.
pub fn open_service(config: &GamehallConfig, bus: EventBus) -> Result<PermissionsService> {
    let path = config.store.resolved_path();
    info!(path = %path.display(), "opening permission store");
    let transactor = Arc::new(ConfigTransactor::new(Arc::new(JsonFileStore::new(path))));
    Ok(PermissionsService::new(
        transactor,
        crate::replay::catalog()?,
        &config.bot,
        config.help.clone(),
        bus,
    ))
}

pub async fn handle_store(action: StoreAction, config: &GamehallConfig) -> Result<()> {
    let service = open_service(config, EventBus::new())?;
    match action {
        StoreAction::Show { guild } => {
            let snapshot = service.transactor().read().await?;
            let record = snapshot
                .guild(guild)
                .with_context(|| format!("guild {guild} is not in the store"))?;
            println!("{}", serde_json::to_string_pretty(record)?);
        },
        StoreAction::Guilds => {
            let snapshot = service.transactor().read().await?;
            for (id, record) in &snapshot.guilds {
                println!("{id}\t{}", record.name);
            }
        },
        StoreAction::SetAdmin { guild, role } => {
            let changed = service.set_admin_role(guild, role).await?;
            report(changed, "admin", guild, role);
        },
        StoreAction::SetMod { guild, role } => {
            let changed = service.set_mod_role(guild, role).await?;
            report(changed, "mod", guild, role);
        },
    }
    Ok(())
}

fn report(changed: bool, slot: &str, guild: GuildId, role: RoleId) {
    if changed {
        eprintln!("Set {slot} role of guild {guild} to {role}.");
    } else {
        eprintln!("Guild {guild} already uses {role} as its {slot} role.");
    }
}
