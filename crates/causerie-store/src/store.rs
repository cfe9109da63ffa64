use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use causerie_shared::types::ChannelKey;

use crate::models::Message;

/// Handle shared between the session dispatch task and the embedding app.
pub type SharedMessageStore = Arc<Mutex<MessageStore>>;

/// Per-channel ordered message sequences with identity-keyed merge.
///
/// Order is receipt order; nothing is ever re-sorted, whatever the
/// `timestamp` fields claim. Every operation is total: missing channels and
/// unknown ids are no-ops reported through the return value, never a panic.
#[derive(Debug, Default)]
pub struct MessageStore {
    channels: HashMap<ChannelKey, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a first-seen message to its channel's sequence. A message
    /// whose id is already present is dropped, which makes duplicate
    /// broadcast delivery and resubscription replay harmless.
    /// Returns true when the message was inserted.
    pub fn append(&mut self, message: Message) -> bool {
        let sequence = self.channels.entry(message.channel.clone()).or_default();
        if sequence.iter().any(|m| m.id == message.id) {
            return false;
        }
        sequence.push(message);
        true
    }

    /// Replaces a message's text and marks it edited. The latest edit wins.
    /// Returns false when the id is not present (stale event).
    pub fn apply_edit(&mut self, channel: &ChannelKey, id: &str, new_text: &str) -> bool {
        match self.find_mut(channel, id) {
            Some(message) => {
                message.text = new_text.to_string();
                message.edited = true;
                true
            }
            None => false,
        }
    }

    /// Marks a message deleted, keeping the record as a tombstone.
    /// Returns false when the id is unknown or the tombstone already set,
    /// so repeated delete events are no-ops.
    pub fn apply_delete(&mut self, channel: &ChannelKey, id: &str) -> bool {
        match self.find_mut(channel, id) {
            Some(message) if !message.deleted => {
                message.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Current ordered sequence for a channel; empty for unknown channels.
    pub fn get(&self, channel: &ChannelKey) -> &[Message] {
        self.channels
            .get(channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of messages held for a channel, tombstones included.
    pub fn len(&self, channel: &ChannelKey) -> usize {
        self.get(channel).len()
    }

    pub fn is_empty(&self, channel: &ChannelKey) -> bool {
        self.get(channel).is_empty()
    }

    /// Replaces a channel's sequence with a fetched history, deduplicated by
    /// id with the earliest occurrence winning. Later `append` calls for ids
    /// already in the history remain no-ops.
    pub fn load_history(&mut self, channel: &ChannelKey, messages: Vec<Message>) {
        let mut sequence: Vec<Message> = Vec::with_capacity(messages.len());
        for message in messages {
            if sequence.iter().any(|m| m.id == message.id) {
                continue;
            }
            sequence.push(message);
        }
        self.channels.insert(channel.clone(), sequence);
    }

    fn find_mut(&mut self, channel: &ChannelKey, id: &str) -> Option<&mut Message> {
        self.channels
            .get_mut(channel)?
            .iter_mut()
            .find(|m| m.id == id)
    }
}
