use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::GamehallConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "gamehall.toml",
    "gamehall.yaml",
    "gamehall.yml",
    "gamehall.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<GamehallConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./gamehall.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/gamehall/gamehall.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GamehallConfig::default()` if no config file is found or the
/// file fails to parse.
pub fn discover_and_load() -> GamehallConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GamehallConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/gamehall/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gamehall").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user-global data directory, home of the permission store.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gamehall").map(|d| d.data_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<GamehallConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
