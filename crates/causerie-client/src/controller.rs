//! Chat controller: one signed-in user's view of the system.
//!
//! Wires REST persistence, the live channel subscription, and the shared
//! message and typing state together. Writes go to the server first and
//! come back through the broadcast; the local store is never written
//! directly by a send, so every client sees the same single path.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{error, info, warn};

use causerie_net::ChannelSession;
use causerie_shared::protocol::ChannelEvent;
use causerie_shared::types::{ChannelKey, Member, UserTag};
use causerie_store::{
    Message, MessageStore, SharedMessageStore, SharedTypingTracker, TypingTracker,
};

use crate::api::{Persistence, RestClient, Roster};
use crate::error::ChatError;

/// Connection settings for one signed-in user.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base, e.g. `http://127.0.0.1:8080`.
    pub api_base: String,

    /// Socket gateway base, e.g. `ws://127.0.0.1:8080`.
    pub socket_base: String,

    /// Bearer token for the REST API.
    pub token: String,

    /// The signed-in user. Echoes of this user's own typing signals are
    /// suppressed locally.
    pub user: UserTag,
}

/// Orchestrates channel viewing and messaging for the embedding UI.
pub struct ChatController {
    config: ClientConfig,
    persistence: Arc<dyn Persistence>,
    roster: Arc<dyn Roster>,
    store: SharedMessageStore,
    typing: SharedTypingTracker,
    session: Option<ChannelSession>,
    members: Vec<Member>,
}

impl ChatController {
    /// Controller backed by the server's REST API.
    pub fn new(config: ClientConfig) -> Self {
        let rest = Arc::new(RestClient::new(&config.api_base, &config.token));
        Self::with_backends(config, rest.clone(), rest)
    }

    /// Controller with explicit persistence and roster backends.
    pub fn with_backends(
        config: ClientConfig,
        persistence: Arc<dyn Persistence>,
        roster: Arc<dyn Roster>,
    ) -> Self {
        let store: SharedMessageStore = Arc::new(Mutex::new(MessageStore::new()));
        let typing: SharedTypingTracker =
            Arc::new(Mutex::new(TypingTracker::new(config.user.clone())));
        Self {
            config,
            persistence,
            roster,
            store,
            typing,
            session: None,
            members: Vec::new(),
        }
    }

    /// Switches the view to a channel: tears down the previous subscription,
    /// subscribes to the new topic, hydrates history, and loads the guild
    /// roster for mention completion.
    ///
    /// A failed roster fetch degrades the mention panel rather than failing
    /// the switch; a failed history fetch leaves the subscription up and
    /// reports the error.
    pub async fn open_channel(&mut self, key: ChannelKey) -> Result<(), ChatError> {
        if let Some(previous) = self.session.take() {
            info!(channel = %previous.key(), "Leaving channel");
            previous.close().await;
        }
        self.members.clear();

        let session = ChannelSession::open(
            key.clone(),
            &self.config.socket_base,
            &self.config.user,
            Arc::clone(&self.store),
            Arc::clone(&self.typing),
        )
        .map_err(|e| ChatError::Socket(e.to_string()))?;
        self.session = Some(session);

        let history = self.persistence.fetch_messages(&key).await?;
        info!(channel = %key, count = history.len(), "History hydrated");
        self.store
            .lock()
            .map_err(|e| ChatError::Internal(format!("Lock poisoned: {e}")))?
            .load_history(&key, history);

        self.members = match &key {
            ChannelKey::Guild { guild_id, .. } => match self.roster.fetch_members(guild_id).await
            {
                Ok(members) => members,
                Err(e) => {
                    warn!(guild = %guild_id, error = %e, "Roster fetch failed, mentions limited to built-ins");
                    Vec::new()
                }
            },
            ChannelKey::Direct { .. } => Vec::new(),
        };

        Ok(())
    }

    /// Leaves the current channel, if any.
    pub async fn close_channel(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.members.clear();
    }

    /// Persists a message, then broadcasts it on the channel topic.
    ///
    /// The local store is only updated when the broadcast echo comes back;
    /// [`ChatError::TransportDown`] means the message is durable on the
    /// server but not yet visible anywhere.
    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        let session = self.session.as_ref().ok_or(ChatError::NoChannel)?;
        let message = self
            .persistence
            .create_message(session.key(), text, &self.config.user)
            .await?;

        let id = message.id.clone();
        let event = ChannelEvent::Message {
            id: message.id,
            channel: session.topic().to_string(),
            content: message.text,
            author: self.config.user.to_string(),
            timestamp: message.timestamp,
        };
        if session.send(&event).await {
            Ok(())
        } else {
            warn!(channel = %session.key(), id = %id, "Broadcast skipped, transport is down");
            Err(ChatError::TransportDown)
        }
    }

    /// Persists a text replacement, then broadcasts the edit.
    pub async fn edit_message(&self, id: &str, new_text: &str) -> Result<(), ChatError> {
        let session = self.session.as_ref().ok_or(ChatError::NoChannel)?;
        self.persistence
            .update_message(session.key(), id, new_text)
            .await?;

        let event = ChannelEvent::MessageEdited {
            id: id.to_string(),
            channel: session.topic().to_string(),
            content: new_text.to_string(),
        };
        if session.send(&event).await {
            Ok(())
        } else {
            Err(ChatError::TransportDown)
        }
    }

    /// Removes a message on the server, then broadcasts the deletion.
    pub async fn delete_message(&self, id: &str) -> Result<(), ChatError> {
        let session = self.session.as_ref().ok_or(ChatError::NoChannel)?;
        self.persistence.delete_message(session.key(), id).await?;

        let event = ChannelEvent::MessageDeleted {
            id: id.to_string(),
            channel: session.topic().to_string(),
        };
        if session.send(&event).await {
            Ok(())
        } else {
            Err(ChatError::TransportDown)
        }
    }

    /// Announces that the local user is composing. Returns false when no
    /// channel is open or the transport is down; the composer's throttle
    /// decides when to call this.
    pub async fn send_typing(&self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let event = ChannelEvent::Typing {
            channel: session.topic().to_string(),
            user: self.config.user.to_string(),
        };
        session.send(&event).await
    }

    /// Snapshot of the active channel's messages, tombstones included.
    pub fn messages(&self) -> Vec<Message> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        match self.store.lock() {
            Ok(guard) => guard.get(session.key()).to_vec(),
            Err(e) => {
                error!(error = %e, "Lock poisoned");
                Vec::new()
            }
        }
    }

    /// Current typing banner for the active channel.
    pub fn typing_banner(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        match self.typing.lock() {
            Ok(tracker) => tracker.banner(session.key(), Instant::now()),
            Err(e) => {
                error!(error = %e, "Lock poisoned");
                None
            }
        }
    }

    /// Roster of the active guild channel; empty for direct messages.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn active_channel(&self) -> Option<&ChannelKey> {
        self.session.as_ref().map(|session| session.key())
    }

    /// True while the channel subscription's socket is up.
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(ChannelSession::is_connected)
            .unwrap_or(false)
    }
}
