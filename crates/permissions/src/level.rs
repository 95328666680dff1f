use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Permission levels, lowest first. Comparison follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimumPermission {
    Everyone,
    /// Named per channel by a moderator.
    Special,
    /// Holds the guild's configured admin or moderator role.
    ModRole,
    GuildOwner,
    /// Listed in the bot's owner configuration.
    BotOwner,
}

impl MinimumPermission {
    pub const ALL: [Self; 5] = [
        Self::Everyone,
        Self::Special,
        Self::ModRole,
        Self::GuildOwner,
        Self::BotOwner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Everyone => "everyone",
            Self::Special => "special",
            Self::ModRole => "mod_role",
            Self::GuildOwner => "guild_owner",
            Self::BotOwner => "bot_owner",
        }
    }
}

impl fmt::Display for MinimumPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinimumPermission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| Error::message(format!("unknown permission level: {s}")))
    }
}
