//! Shared identifiers, participant types, and error helpers used across all
//! gamehall crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{ChannelId, GuildId, MessageId, RoleId, UserId, UserRef},
};
