use serde::{Deserialize, Serialize};

use causerie_shared::types::ChannelKey;

/// A chat message as held in a channel's ordered sequence.
///
/// `id` is issued by the backend on create; the client never invents one,
/// and it is the sole identity used for deduplication. Deletion is a
/// tombstone: the record stays in place with `deleted` set, which keeps
/// repeated delete events idempotent and lets a UI keep its scroll anchor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub channel: ChannelKey,
    pub text: String,
    pub author: String,
    pub author_discriminator: String,
    /// Server-issued, opaque to ordering: the sequence is receipt-ordered.
    pub timestamp: String,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub deleted: bool,
}
