use serde::{Deserialize, Serialize};

/// All real-time events exchanged over a channel topic.
///
/// The wire form is JSON tagged by `type`, e.g.
/// `{"type":"message","id":"...","channel":"srv1-general",...}`.
/// `author` and `user` carry the composite `username#discriminator`
/// identity; `channel` carries the topic string the event was published on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A persisted chat message fanned out to subscribers.
    Message {
        id: String,
        channel: String,
        content: String,
        author: String,
        timestamp: String,
    },

    /// In-place content replacement for an already-delivered message.
    MessageEdited {
        id: String,
        channel: String,
        content: String,
    },

    /// Tombstone marker for an already-delivered message.
    MessageDeleted { id: String, channel: String },

    /// Ephemeral typing signal; expires client-side.
    Typing { channel: String, user: String },

    /// Presence notice, log-level visibility only.
    UserJoined { user: String },

    /// Presence notice, log-level visibility only.
    UserLeft { user: String },
}

impl ChannelEvent {
    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the JSON wire form. Unknown `type` values fail.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
