use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use {
    async_trait::async_trait,
    gamehall_common::{ChannelId, MessageId, UserId},
    tracing::debug,
};

use crate::{Error, Result};

/// Side effects sessions and services perform on the platform.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Post a message to a channel, returning the new message id.
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageId>;

    /// Send a direct message to a user.
    async fn send_direct(&self, user: UserId, text: &str) -> Result<MessageId>;

    /// Replace the content of a previously sent message.
    async fn edit_text(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str)
    -> Result<()>;

    /// Strip one user's reaction from a message.
    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        user: UserId,
        emoji: &str,
    ) -> Result<()>;
}

/// One side effect captured by [`RecordingOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    Sent {
        channel: ChannelId,
        message: MessageId,
        text: String,
    },
    Direct {
        user: UserId,
        message: MessageId,
        text: String,
    },
    Edited {
        channel: ChannelId,
        message: MessageId,
        text: String,
    },
    Deleted {
        channel: ChannelId,
        message: MessageId,
    },
    ReactionAdded {
        message: MessageId,
        emoji: String,
    },
    ReactionRemoved {
        message: MessageId,
        user: UserId,
        emoji: String,
    },
}

/// Outbound adapter that records every action instead of talking to a
/// platform. Used by the replay tool and in tests.
pub struct RecordingOutbound {
    next_message: AtomicU64,
    failing: AtomicBool,
    actions: Mutex<Vec<OutboundAction>>,
}

impl Default for RecordingOutbound {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::starting_at(MessageId(1_000))
    }

    /// Ids handed out for sent messages start at `first`.
    pub fn starting_at(first: MessageId) -> Self {
        Self {
            next_message: AtomicU64::new(first.get()),
            failing: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent call fail with [`Error::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything recorded so far.
    pub fn actions(&self) -> Vec<OutboundAction> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }

    /// Texts sent to `channel`, in order.
    pub fn texts_in(&self, channel: ChannelId) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                OutboundAction::Sent {
                    channel: c, text, ..
                } if c == channel => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: OutboundAction) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::unavailable("outbound disabled"));
        }
        debug!(?action, "outbound");
        self.actions
            .lock()
            .map_err(|_| Error::unavailable("outbound log poisoned"))?
            .push(action);
        Ok(())
    }

    fn mint(&self) -> MessageId {
        MessageId(self.next_message.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageId> {
        let message = self.mint();
        self.record(OutboundAction::Sent {
            channel,
            message,
            text: text.to_string(),
        })?;
        Ok(message)
    }

    async fn send_direct(&self, user: UserId, text: &str) -> Result<MessageId> {
        let message = self.mint();
        self.record(OutboundAction::Direct {
            user,
            message,
            text: text.to_string(),
        })?;
        Ok(message)
    }

    async fn edit_text(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()> {
        let known = self.actions().iter().any(|action| {
            matches!(action, OutboundAction::Sent { message: m, .. } if *m == message)
        });
        if !known {
            return Err(Error::unknown_target(message));
        }
        self.record(OutboundAction::Edited {
            channel,
            message,
            text: text.to_string(),
        })
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        self.record(OutboundAction::Deleted { channel, message })
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<()> {
        self.record(OutboundAction::ReactionAdded {
            message,
            emoji: emoji.to_string(),
        })
    }

    async fn remove_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        user: UserId,
        emoji: &str,
    ) -> Result<()> {
        self.record(OutboundAction::ReactionRemoved {
            message,
            user,
            emoji: emoji.to_string(),
        })
    }
}
