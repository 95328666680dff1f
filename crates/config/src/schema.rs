/// Config schema types (bot identity, permission store, help, trivia).
use std::path::PathBuf;

use {
    gamehall_common::UserId,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GamehallConfig {
    pub bot: BotConfig,
    pub store: StoreConfig,
    pub help: HelpConfig,
    pub trivia: TriviaConfig,
}

/// Who the bot is and who owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Users granted the `BotOwner` permission level everywhere.
    pub owners: Vec<UserId>,
    /// The bot's own user id. Reactions it adds itself are ignored.
    pub user_id: Option<UserId>,
    /// Prefix the command framework strips before parsing.
    pub command_prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            owners: Vec::new(),
            user_id: None,
            command_prefix: "!".into(),
        }
    }
}

/// Location of the persisted permission store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding guild permission records. Defaults to
    /// `<data_dir>/permissions.json`.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Configured path, or the default under the data directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            crate::loader::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("permissions.json")
        })
    }
}

/// Help listing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpConfig {
    /// Fancy (reaction-paginated) help for guilds that never set it.
    pub fancy_by_default: bool,
    /// Commands shown per help page.
    pub page_size: usize,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            fancy_by_default: false,
            page_size: 10,
        }
    }
}

/// Trivia round settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriviaConfig {
    /// Questions asked per round before it ends.
    pub questions_per_round: usize,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            questions_per_round: 10,
        }
    }
}
