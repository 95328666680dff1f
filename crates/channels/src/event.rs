use {
    gamehall_common::{ChannelId, GuildId, MessageId, RoleId, UserId, UserRef},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

// ── Inbound events ──────────────────────────────────────────────────────────

/// Events delivered by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    MessageReceived(InboundMessage),
    ReactionAdded(Reaction),
    ReactionRemoved(Reaction),
    MessageDeleted {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    ChannelCreated(ChannelInfo),
    ChannelDestroyed(ChannelInfo),
    GuildAvailable(GuildInfo),
    UserJoined(GuildMember),
}

impl InboundEvent {
    /// Parse one line of a JSONL event recording.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_input("empty event line"));
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Channel the event happened in, when it has one.
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Self::MessageReceived(msg) => Some(msg.channel_id),
            Self::ReactionAdded(r) | Self::ReactionRemoved(r) => Some(r.channel_id),
            Self::MessageDeleted { channel_id, .. } => Some(*channel_id),
            Self::ChannelCreated(ch) | Self::ChannelDestroyed(ch) => Some(ch.id),
            Self::GuildAvailable(_) | Self::UserJoined(_) => None,
        }
    }

    /// Message the event refers to (reactions, deletions) or carries.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Self::MessageReceived(msg) => Some(msg.id),
            Self::ReactionAdded(r) | Self::ReactionRemoved(r) => Some(r.message_id),
            Self::MessageDeleted { message_id, .. } => Some(*message_id),
            _ => None,
        }
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageReceived(_) => "message_received",
            Self::ReactionAdded(_) => "reaction_added",
            Self::ReactionRemoved(_) => "reaction_removed",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelDestroyed(_) => "channel_destroyed",
            Self::GuildAvailable(_) => "guild_available",
            Self::UserJoined(_) => "user_joined",
        }
    }
}

/// A message posted in a guild channel or sent as a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    pub author: UserRef,
    pub content: String,
    /// True when the message arrived through a direct-message channel.
    #[serde(default)]
    pub is_direct: bool,
    /// Guild roles the author holds. Empty for direct messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleId>,
}

/// An emoji reaction added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub emoji: String,
}

/// A guild channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub name: String,
}

/// A guild as announced when it becomes available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: GuildId,
    #[serde(default)]
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub channels: Vec<ChannelId>,
    #[serde(default)]
    pub members: Vec<UserId>,
}

impl GuildInfo {
    /// The role every member implicitly holds. Shares the guild's id.
    pub fn everyone_role(&self) -> RoleId {
        RoleId(self.id.get())
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: GuildId,
    pub user: UserRef,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_message_line() {
        let line = r#"{"kind":"message_received","id":5,"channel_id":10,"author":{"id":1,"name":"ann"},"content":"hi","is_direct":true}"#;
        let event = InboundEvent::from_json_line(line).unwrap();
        let InboundEvent::MessageReceived(msg) = &event else {
            panic!("expected a message, got {event:?}");
        };
        assert!(msg.is_direct);
        assert_eq!(msg.guild_id, None);
        assert_eq!(event.channel_id(), Some(ChannelId(10)));
        assert_eq!(event.message_id(), Some(MessageId(5)));
        assert_eq!(event.kind(), "message_received");
    }

    #[test]
    fn message_roles_default_to_empty() {
        let line = r#"{"kind":"message_received","id":5,"channel_id":10,"guild_id":3,"author":{"id":1,"name":"ann"},"content":"!stoptrivia","roles":[300,301]}"#;
        let InboundEvent::MessageReceived(msg) = InboundEvent::from_json_line(line).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.roles, vec![RoleId(300), RoleId(301)]);

        let bare = r#"{"kind":"message_received","id":5,"channel_id":10,"author":{"id":1,"name":"ann"},"content":"hi"}"#;
        let InboundEvent::MessageReceived(msg) = InboundEvent::from_json_line(bare).unwrap() else {
            panic!("expected a message");
        };
        assert!(msg.roles.is_empty());
    }

    #[test]
    fn parses_message_deleted() {
        let line = r#"{"kind":"message_deleted","channel_id":3,"message_id":4}"#;
        let event = InboundEvent::from_json_line(line).unwrap();
        assert_eq!(event.message_id(), Some(MessageId(4)));
    }

    #[test]
    fn empty_line_is_invalid_input() {
        let err = InboundEvent::from_json_line("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn everyone_role_shares_guild_id() {
        let guild = GuildInfo {
            id: GuildId(99),
            name: "g".into(),
            owner_id: UserId(1),
            channels: vec![],
            members: vec![],
        };
        assert_eq!(guild.everyone_role(), RoleId(99));
    }
}
