//! Bot configuration and the persistent permission store.
//!
//! Bot config files: `gamehall.toml`, `gamehall.yaml`, or `gamehall.json`,
//! searched in `./` then `~/.config/gamehall/`, with `${ENV_VAR}`
//! substitution.
//!
//! The permission store holds per-guild [`PermissionConfig`] records. All
//! writes go through [`ConfigTransactor`], which serializes every
//! load/mutate/save cycle behind a single lock.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod record;
pub mod schema;
pub mod store;
pub mod transaction;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, data_dir, discover_and_load, load_config},
    record::{ChannelRecord, GuildRecord, ModuleState, PermissionConfig, module_key},
    schema::{BotConfig, GamehallConfig, HelpConfig, StoreConfig, TriviaConfig},
    store::{ConfigHandle, ConfigStore, JsonFileStore, MemoryStore},
    transaction::ConfigTransactor,
    validate::{Diagnostic, Severity, ValidationResult},
};
