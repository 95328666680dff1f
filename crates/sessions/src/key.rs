use std::fmt;

use {
    gamehall_common::{ChannelId, MessageId},
    serde::{Deserialize, Serialize},
};

/// Identity a session is registered under.
///
/// Games and trivia rounds own a channel; paginated displays own the message
/// they render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum SessionKey {
    Channel(ChannelId),
    Message(MessageId),
}

impl From<ChannelId> for SessionKey {
    fn from(id: ChannelId) -> Self {
        Self::Channel(id)
    }
}

impl From<MessageId> for SessionKey {
    fn from(id: MessageId) -> Self {
        Self::Message(id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::Message(id) => write!(f, "message:{id}"),
        }
    }
}
