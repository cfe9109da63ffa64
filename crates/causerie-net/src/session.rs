//! Channel subscription lifecycle and inbound event dispatch.
//!
//! A [`ChannelSession`] binds one channel key to one socket connection.
//! Inbound frames are decoded and applied to the message store and the
//! typing tracker by a dispatch task; outbound events go through
//! [`ChannelSession::send`]. Exactly one session is alive per viewed
//! channel, and dropping it for another channel tears the socket down
//! before the next one connects.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use causerie_shared::protocol::ChannelEvent;
use causerie_shared::types::{ChannelKey, UserTag};
use causerie_store::{Message, SharedMessageStore, SharedTypingTracker};

use crate::socket::{spawn_socket, SocketCommand, SocketConfig, SocketNotification};

/// Interval between typing-tracker sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// One live subscription to a channel's event stream.
pub struct ChannelSession {
    key: ChannelKey,
    topic: String,
    cmd_tx: mpsc::Sender<SocketCommand>,
    connected_rx: watch::Receiver<bool>,
    dispatch: JoinHandle<()>,
}

impl ChannelSession {
    /// Opens the socket for the key's topic and starts the dispatch task.
    ///
    /// The session is usable immediately: connecting happens in the
    /// background and [`ChannelSession::send`] reports `false` until the
    /// link is up.
    pub fn open(
        key: ChannelKey,
        endpoint: &str,
        local_user: &UserTag,
        store: SharedMessageStore,
        typing: SharedTypingTracker,
    ) -> anyhow::Result<Self> {
        let topic = key.to_topic();
        let config = SocketConfig::new(endpoint, &topic, &local_user.username);
        let (cmd_tx, notif_rx, connected_rx) = spawn_socket(config)?;

        let dispatch = tokio::spawn(dispatch_events(
            key.clone(),
            topic.clone(),
            notif_rx,
            store,
            typing,
        ));

        info!(channel = %key, topic = %topic, "Channel session opened");

        Ok(Self {
            key,
            topic,
            cmd_tx,
            connected_rx,
            dispatch,
        })
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True while the underlying socket is up.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Watch handle for connectivity, for UIs that show a connecting state.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Publishes an event on the channel topic. Returns `false`, without
    /// erroring, when the transport is down: the event is dropped and the
    /// caller decides whether that matters.
    pub async fn send(&self, event: &ChannelEvent) -> bool {
        if !self.is_connected() {
            debug!(topic = %self.topic, "Send skipped, socket not connected");
            return false;
        }
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                error!(topic = %self.topic, error = %e, "Event serialization failed");
                return false;
            }
        };
        self.cmd_tx
            .send(SocketCommand::Publish(frame))
            .await
            .is_ok()
    }

    /// Tears the subscription down: closes the socket and waits for the
    /// dispatch task to drain.
    pub async fn close(self) {
        let _ = self.cmd_tx.send(SocketCommand::Shutdown).await;
        let _ = self.dispatch.await;
        info!(channel = %self.key, "Channel session closed");
    }
}

async fn dispatch_events(
    key: ChannelKey,
    topic: String,
    mut notif_rx: mpsc::Receiver<SocketNotification>,
    store: SharedMessageStore,
    typing: SharedTypingTracker,
) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            notification = notif_rx.recv() => match notification {
                Some(SocketNotification::Connected) => {
                    info!(topic = %topic, "Channel subscription active");
                }
                Some(SocketNotification::Disconnected) => {
                    warn!(topic = %topic, "Channel subscription lost, transport reconnecting");
                }
                Some(SocketNotification::FrameReceived { text }) => {
                    apply_event(&key, &topic, &text, &store, &typing);
                }
                None => break,
            },
            _ = sweep.tick() => {
                match typing.lock() {
                    Ok(mut tracker) => tracker.sweep(Instant::now()),
                    Err(e) => error!(topic = %topic, error = %e, "Typing tracker lock poisoned"),
                }
            }
        }
    }

    debug!(topic = %topic, "Channel dispatch ended");
}

/// Decodes one inbound frame and applies it to the channel state.
///
/// Malformed frames, unknown event types, and events for another topic are
/// dropped with a log line; nothing in here may panic or propagate.
fn apply_event(
    key: &ChannelKey,
    topic: &str,
    raw: &str,
    store: &SharedMessageStore,
    typing: &SharedTypingTracker,
) {
    let event = match ChannelEvent::from_json(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(topic = %topic, error = %e, "Dropping malformed channel event");
            return;
        }
    };

    match event {
        ChannelEvent::Message {
            id,
            channel,
            content,
            author,
            timestamp,
        } => {
            if channel != topic {
                debug!(topic = %topic, event_topic = %channel, "Ignoring event for another topic");
                return;
            }
            let author_tag = UserTag::parse(&author);

            // A message from a user supersedes their typing state.
            match typing.lock() {
                Ok(mut tracker) => tracker.clear(key, &author_tag),
                Err(e) => error!(topic = %topic, error = %e, "Typing tracker lock poisoned"),
            }

            let message = Message {
                id: id.clone(),
                channel: key.clone(),
                text: content,
                author: author_tag.username,
                author_discriminator: author_tag.discriminator,
                timestamp,
                edited: false,
                deleted: false,
            };
            match store.lock() {
                Ok(mut guard) => {
                    if guard.append(message) {
                        debug!(topic = %topic, id = %id, "Message appended");
                    } else {
                        debug!(topic = %topic, id = %id, "Duplicate message dropped");
                    }
                }
                Err(e) => error!(topic = %topic, error = %e, "Message store lock poisoned"),
            }
        }

        ChannelEvent::MessageEdited { id, channel, content } => {
            if channel != topic {
                debug!(topic = %topic, event_topic = %channel, "Ignoring event for another topic");
                return;
            }
            match store.lock() {
                Ok(mut guard) => {
                    if !guard.apply_edit(key, &id, &content) {
                        debug!(topic = %topic, id = %id, "Stale edit ignored");
                    }
                }
                Err(e) => error!(topic = %topic, error = %e, "Message store lock poisoned"),
            }
        }

        ChannelEvent::MessageDeleted { id, channel } => {
            if channel != topic {
                debug!(topic = %topic, event_topic = %channel, "Ignoring event for another topic");
                return;
            }
            match store.lock() {
                Ok(mut guard) => {
                    if !guard.apply_delete(key, &id) {
                        debug!(topic = %topic, id = %id, "Stale delete ignored");
                    }
                }
                Err(e) => error!(topic = %topic, error = %e, "Message store lock poisoned"),
            }
        }

        ChannelEvent::Typing { channel, user } => {
            if channel != topic {
                debug!(topic = %topic, event_topic = %channel, "Ignoring event for another topic");
                return;
            }
            match typing.lock() {
                Ok(mut tracker) => tracker.record(key, UserTag::parse(&user), Instant::now()),
                Err(e) => error!(topic = %topic, error = %e, "Typing tracker lock poisoned"),
            }
        }

        ChannelEvent::UserJoined { user } => {
            info!(topic = %topic, user = %user, "User joined");
        }

        ChannelEvent::UserLeft { user } => {
            info!(topic = %topic, user = %user, "User left");
        }
    }
}
