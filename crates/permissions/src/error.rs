use {
    gamehall_common::{ChannelId, RoleId, UserId},
    thiserror::Error,
};

use crate::resolve::Decision;

#[derive(Debug, Error)]
pub enum Error {
    /// The command must not run; callers decline silently.
    #[error("{command} declined: {decision}")]
    PermissionDenied { command: String, decision: Decision },

    #[error("role {role_id} cannot be assigned as the {slot} role")]
    InvalidRoleAssignment { role_id: RoleId, slot: &'static str },

    #[error("no module named {name}")]
    UnknownModule { name: String },

    #[error("the {name} module cannot be blacklisted")]
    ProtectedModule { name: String },

    #[error("multiple modules share a name: {}", names.join(", "))]
    DuplicateModules { names: Vec<String> },

    /// Special users need read and send access to the channel.
    #[error("user {user_id} cannot read and send in channel {channel_id}")]
    NoChannelAccess {
        user_id: UserId,
        channel_id: ChannelId,
    },

    /// Load or save of the permission store failed; nothing was committed.
    #[error(transparent)]
    Persistence(gamehall_config::Error),

    #[error(transparent)]
    Config(gamehall_config::Error),

    #[error(transparent)]
    Session(#[from] gamehall_sessions::Error),

    #[error(transparent)]
    Outbound(#[from] gamehall_channels::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn denied(command: impl Into<String>, decision: Decision) -> Self {
        Self::PermissionDenied {
            command: command.into(),
            decision,
        }
    }
}

impl From<gamehall_config::Error> for Error {
    fn from(err: gamehall_config::Error) -> Self {
        match err {
            gamehall_config::Error::InvalidRoleAssignment { role_id, slot } => {
                Self::InvalidRoleAssignment { role_id, slot }
            },
            err if err.is_persistence_failure() => Self::Persistence(err),
            err => Self::Config(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
