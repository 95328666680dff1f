use {gamehall_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no trivia questions loaded")]
    NoQuestions,

    #[error(transparent)]
    Session(#[from] gamehall_sessions::Error),

    #[error(transparent)]
    Outbound(#[from] gamehall_channels::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

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

    /// Another round or game already owns the channel.
    pub fn is_already_active(&self) -> bool {
        matches!(
            self,
            Self::Session(gamehall_sessions::Error::AlreadyActive { .. })
        )
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gamehall_common::impl_context!();
