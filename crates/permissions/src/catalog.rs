//! Registered command modules.
//!
//! Module lists in the permission store refer to modules by name, so names
//! must be unique ignoring case. The built-in [`PERMISSIONS_MODULE`] is
//! always present and can never be blacklisted.

use std::collections::BTreeSet;

use {
    gamehall_config::module_key,
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result, level::MinimumPermission};

pub const PERMISSIONS_MODULE: &str = "Permissions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    pub module: String,
    pub required: MinimumPermission,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Hidden commands never show up in help listings.
    #[serde(default)]
    pub hidden: bool,
}

impl CommandInfo {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        required: MinimumPermission,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            required,
            summary: String::new(),
            aliases: Vec::new(),
            hidden: false,
        }
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name.to_lowercase() == name || self.aliases.iter().any(|a| a.to_lowercase() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    #[serde(default)]
    pub commands: Vec<CommandInfo>,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    /// Add a command; its module name is set to this module's.
    #[must_use]
    pub fn command(mut self, mut command: CommandInfo) -> Self {
        command.module = self.name.clone();
        self.commands.push(command);
        self
    }
}

/// The administrative commands every catalog carries.
pub fn permissions_module() -> ModuleInfo {
    use MinimumPermission::*;

    ModuleInfo::new(PERMISSIONS_MODULE)
        .command(CommandInfo::new("help", "", Everyone).summary("Display commands you can use."))
        .command(
            CommandInfo::new("modules", "", ModRole).summary("List all the modules loaded in the bot."),
        )
        .command(
            CommandInfo::new("setadmin", "", GuildOwner).summary("Set the admin role for this server."),
        )
        .command(
            CommandInfo::new("setmod", "", GuildOwner)
                .summary("Set the moderator role for this server."),
        )
        .command(
            CommandInfo::new("addspecial", "", ModRole)
                .alias("addsp")
                .summary("Give someone special command privileges in this channel."),
        )
        .command(
            CommandInfo::new("remspecial", "", ModRole)
                .alias("remsp")
                .summary("Remove someone's special command privileges in this channel."),
        )
        .command(
            CommandInfo::new("whitelist", "", ModRole)
                .alias("wl")
                .summary("Whitelist a module for this channel or guild."),
        )
        .command(
            CommandInfo::new("blacklist", "", ModRole)
                .alias("bl")
                .summary("Blacklist a module for this channel or guild."),
        )
        .command(
            CommandInfo::new("fancyhelp", "", GuildOwner)
                .summary("Turn the paginated help display on or off for this server."),
        )
}

#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: Vec<ModuleInfo>,
}

impl ModuleCatalog {
    /// Build a catalog from `modules` plus the built-in permissions module.
    ///
    /// Fails with [`Error::DuplicateModules`] if two modules share a name
    /// ignoring case.
    pub fn new(modules: impl IntoIterator<Item = ModuleInfo>) -> Result<Self> {
        let mut all = vec![permissions_module()];
        all.extend(modules);

        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for module in &all {
            let key = module_key(&module.name);
            if !seen.insert(key.clone()) && reported.insert(key) {
                duplicates.push(module.name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(Error::DuplicateModules { names: duplicates });
        }
        Ok(Self { modules: all })
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    /// Case-insensitive lookup.
    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        let key = module_key(name);
        self.modules.iter().find(|m| module_key(&m.name) == key)
    }

    /// Names of the modules an admin can toggle, i.e. all but the
    /// permissions module.
    pub fn toggleable_names(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|m| m.name != PERMISSIONS_MODULE)
            .map(|m| m.name.as_str())
            .collect()
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandInfo> {
        self.modules.iter().flat_map(|m| m.commands.iter())
    }

    pub fn command(&self, name: &str) -> Option<&CommandInfo> {
        self.commands().find(|c| c.answers_to(name))
    }
}
