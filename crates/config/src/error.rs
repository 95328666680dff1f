use {
    gamehall_common::{ChannelId, FromMessage, GuildId, RoleId},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error("file lock failed: {message}")]
    Lock { message: String },

    #[error("unsupported config format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("guild {guild_id} is not known to the permission store")]
    UnknownGuild { guild_id: GuildId },

    #[error("channel {channel_id} is not known to the permission store")]
    UnknownChannel { channel_id: ChannelId },

    /// The guild's everyone role can never be the admin or mod role.
    #[error("role {role_id} cannot be assigned as the {slot} role")]
    InvalidRoleAssignment { role_id: RoleId, slot: &'static str },

    /// Loading or saving the store failed; nothing was committed.
    #[error("permission store {operation} failed: {source}")]
    PersistenceFailure {
        operation: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn lock_failed(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn persistence(operation: &'static str, source: Error) -> Self {
        Self::PersistenceFailure {
            operation,
            source: Box::new(source),
        }
    }

    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailure { .. })
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gamehall_common::impl_context!();
