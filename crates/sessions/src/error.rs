use thiserror::Error;

use crate::{game::Phase, key::SessionKey};

#[derive(Debug, Error)]
pub enum Error {
    /// The key already has a live session.
    #[error("a session is already active for {key}")]
    AlreadyActive { key: SessionKey },

    #[error("a turn order needs at least one participant")]
    EmptyTurnOrder,

    #[error("cannot remove the last remaining participant")]
    LastParticipant,

    #[error("not a participant of this session")]
    NotAParticipant,

    #[error("cannot {action} while in {phase:?}")]
    InvalidTransition { action: &'static str, phase: Phase },

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
    pub fn invalid_transition(action: &'static str, phase: Phase) -> Self {
        Self::InvalidTransition { action, phase }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
