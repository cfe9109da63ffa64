use serde::{Deserialize, Serialize};

// Conversation scope: a guild channel or a direct-message thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Guild {
        guild_id: String,
        channel_name: String,
    },
    Direct {
        dm_id: String,
    },
}

impl ChannelKey {
    pub fn guild(guild_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self::Guild {
            guild_id: guild_id.into(),
            channel_name: channel_name.into(),
        }
    }

    pub fn direct(dm_id: impl Into<String>) -> Self {
        Self::Direct { dm_id: dm_id.into() }
    }

    /// Transport topic bound to this key: `"{guild_id}-{channel_name}"` for
    /// guild channels, `"dm-{dm_id}"` for direct messages.
    pub fn to_topic(&self) -> String {
        match self {
            Self::Guild {
                guild_id,
                channel_name,
            } => format!("{guild_id}-{channel_name}"),
            Self::Direct { dm_id } => format!("dm-{dm_id}"),
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guild {
                guild_id,
                channel_name,
            } => write!(f, "{guild_id}:{channel_name}"),
            Self::Direct { dm_id } => write!(f, "dm:{dm_id}"),
        }
    }
}

// User identity as it travels on the wire: "username#discriminator".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserTag {
    pub username: String,
    pub discriminator: String,
}

impl UserTag {
    pub fn new(username: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            discriminator: discriminator.into(),
        }
    }

    /// Splits a wire identity on the first `#`. An identity without a
    /// discriminator keeps the whole string as the username.
    pub fn parse(identity: &str) -> Self {
        match identity.split_once('#') {
            Some((username, discriminator)) => Self::new(username, discriminator),
            None => Self {
                username: identity.to_string(),
                discriminator: String::new(),
            },
        }
    }
}

impl std::fmt::Display for UserTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.discriminator.is_empty() {
            write!(f, "{}", self.username)
        } else {
            write!(f, "{}#{}", self.username, self.discriminator)
        }
    }
}

/// Roster entry for one guild member, read-only for this crate family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub discriminator: String,
}
