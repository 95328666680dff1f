//! Platform identifiers.
//!
//! Chat platforms hand out 64-bit snowflake ids for users, channels, guilds,
//! roles, and messages. Each gets its own newtype so a channel id can never
//! be passed where a message id is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| Error::invalid_id(s))
            }
        }
    };
}

snowflake!(
    /// A platform user.
    UserId
);
snowflake!(
    /// A text channel, guild channel or direct-message channel.
    ChannelId
);
snowflake!(
    /// A guild (server).
    GuildId
);
snowflake!(
    /// A guild role. The guild's own id doubles as its "everyone" role.
    RoleId
);
snowflake!(
    /// A single message.
    MessageId
);

/// A user as seen in an event: id plus the display name at the time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
