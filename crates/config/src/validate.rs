//! Configuration validation.
//!
//! Loads the config file (or defaults) and reports problems that would make
//! parts of the bot unreachable or misbehave at runtime.

use std::{collections::HashSet, path::Path};

use crate::{loader, schema::GamehallConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "help.page_size". Empty for file-level problems.
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate the config at `path`, or the discovered config file when `None`.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(loader::find_config_file);
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path: config_path.clone(),
    };

    let config = match &config_path {
        Some(p) => match loader::load_config(p) {
            Ok(cfg) => cfg,
            Err(e) => {
                result.push(Severity::Error, "", e.to_string());
                return result;
            },
        },
        None => {
            result.push(Severity::Info, "", "no config file found, using defaults");
            GamehallConfig::default()
        },
    };

    check_config(&config, &mut result);
    result
}

fn check_config(config: &GamehallConfig, result: &mut ValidationResult) {
    if config.bot.owners.is_empty() {
        result.push(
            Severity::Warning,
            "bot.owners",
            "no bot owners configured; BotOwner commands can never run",
        );
    }
    let mut seen = HashSet::new();
    for owner in &config.bot.owners {
        if !seen.insert(owner) {
            result.push(
                Severity::Warning,
                "bot.owners",
                format!("owner {owner} is listed more than once"),
            );
        }
    }
    if config.bot.user_id.is_none() {
        result.push(
            Severity::Warning,
            "bot.user_id",
            "bot user id not set; the bot's own help reactions will not be ignored",
        );
    }
    if config.bot.command_prefix.trim().is_empty() {
        result.push(Severity::Error, "bot.command_prefix", "prefix is empty");
    }
    if config.help.page_size == 0 {
        result.push(Severity::Error, "help.page_size", "must be at least 1");
    }
    if config.trivia.questions_per_round == 0 {
        result.push(
            Severity::Error,
            "trivia.questions_per_round",
            "must be at least 1",
        );
    }
    if let Some(parent) = config.store.resolved_path().parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        result.push(
            Severity::Info,
            "store.path",
            format!("{} does not exist yet and will be created", parent.display()),
        );
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn validate_str(contents: &str) -> ValidationResult {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamehall.toml");
        std::fs::write(&path, contents).unwrap();
        validate(Some(&path))
    }

    #[test]
    fn clean_config_has_no_errors() {
        let result = validate_str(
            r#"
            [bot]
            owners = [1]
            user_id = 2
            "#,
        );
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 0);
    }

    #[test]
    fn zero_page_size_is_an_error() {
        let result = validate_str("[bot]\nowners = [1]\nuser_id = 2\n[help]\npage_size = 0\n");
        assert!(result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.path == "help.page_size")
        );
    }

    #[test]
    fn missing_owners_and_duplicates_warn() {
        let empty = validate_str("[bot]\nuser_id = 2\n");
        assert_eq!(empty.count(Severity::Warning), 1);

        let dup = validate_str("[bot]\nowners = [1, 1]\nuser_id = 2\n");
        assert_eq!(dup.count(Severity::Warning), 1);
    }

    #[test]
    fn syntax_error_is_reported() {
        let result = validate_str("[bot\nowners = ");
        assert!(result.has_errors());
    }
}
