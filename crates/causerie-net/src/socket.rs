//! Socket task with the tokio mpsc command/notification pattern.
//!
//! The WebSocket connection lives in a dedicated tokio task. External code
//! talks to it through typed command and notification channels plus a watch
//! channel for connectivity, keeping the transport fully asynchronous and
//! decoupled. The task owns reconnection; the subscribed topic is bound
//! into the connection URL, so every reconnect restores the subscription.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use causerie_shared::constants::{RECONNECT_BASE_MS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_MS};

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the socket task.
#[derive(Debug)]
pub enum SocketCommand {
    /// Publish a JSON frame on the bound topic.
    Publish(String),
    /// Close the connection and end the task.
    Shutdown,
}

/// Notifications sent *from* the socket task to the session.
#[derive(Debug, Clone)]
pub enum SocketNotification {
    /// The connection (or a reconnection) is up; the topic is subscribed.
    Connected,
    /// The connection dropped; the task is backing off to reconnect.
    Disconnected,
    /// A text frame arrived on the bound topic.
    FrameReceived { text: String },
}

/// Configuration for one socket connection.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Gateway endpoint, e.g. `ws://127.0.0.1:8080`.
    pub endpoint: String,
    /// Transport topic this connection subscribes to.
    pub topic: String,
    /// Username announced to the gateway.
    pub user: String,
    /// First reconnect delay.
    pub reconnect_base: Duration,
    /// Reconnect delay ceiling.
    pub reconnect_max: Duration,
    /// Consecutive failures tolerated before the task gives up.
    pub reconnect_attempts: u32,
}

impl SocketConfig {
    pub fn new(
        endpoint: impl Into<String>,
        topic: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            topic: topic.into(),
            user: user.into(),
            reconnect_base: Duration::from_millis(RECONNECT_BASE_MS),
            reconnect_max: Duration::from_millis(RECONNECT_MAX_MS),
            reconnect_attempts: RECONNECT_MAX_ATTEMPTS,
        }
    }

    /// Full connection URL with the topic and user query-bound.
    pub fn url(&self) -> String {
        format!(
            "{}/ws?channel={}&user={}",
            self.endpoint.trim_end_matches('/'),
            self.topic,
            self.user
        )
    }
}

/// How a live connection ended.
enum Disconnect {
    Lost,
    Shutdown,
}

/// Spawn the socket in a background tokio task.
///
/// Returns channels for sending commands and receiving notifications, plus
/// a watch handle that is `true` while the connection is up. The task
/// connects in the background: commands sent before the link is up are
/// dropped, and the session layer guards sends with the watch handle.
///
/// Fails only when the configured endpoint does not form a valid URL.
pub fn spawn_socket(
    config: SocketConfig,
) -> anyhow::Result<(
    mpsc::Sender<SocketCommand>,
    mpsc::Receiver<SocketNotification>,
    watch::Receiver<bool>,
)> {
    let url = config.url();
    url.as_str()
        .into_client_request()
        .map_err(|e| anyhow::anyhow!("Invalid socket url {url}: {e}"))?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SocketCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<SocketNotification>(256);
    let (connected_tx, connected_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut attempt: u32 = 0;

        'reconnect: loop {
            match connect_async(url.as_str()).await {
                Ok((ws, _response)) => {
                    attempt = 0;
                    let _ = connected_tx.send(true);
                    info!(topic = %config.topic, "Socket connected");
                    let _ = notif_tx.send(SocketNotification::Connected).await;

                    let disconnect =
                        run_connection(ws, &mut cmd_rx, &notif_tx, &config.topic).await;

                    let _ = connected_tx.send(false);
                    match disconnect {
                        Disconnect::Shutdown => break 'reconnect,
                        Disconnect::Lost => {
                            let _ = notif_tx.send(SocketNotification::Disconnected).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(topic = %config.topic, error = %e, "Socket connect failed");
                }
            }

            attempt += 1;
            if attempt > config.reconnect_attempts {
                error!(
                    topic = %config.topic,
                    attempts = config.reconnect_attempts,
                    "Giving up on socket reconnection"
                );
                break;
            }

            let delay = backoff_delay(attempt, &config);
            debug!(
                topic = %config.topic,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );

            // Stay responsive to shutdown while backing off. Publishes
            // cannot be delivered here, so they are dropped.
            let deadline = tokio::time::Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    cmd = cmd_rx.recv() => match cmd {
                        Some(SocketCommand::Publish(_)) => {
                            debug!(topic = %config.topic, "Publish dropped while disconnected");
                        }
                        Some(SocketCommand::Shutdown) | None => break 'reconnect,
                    },
                }
            }
        }

        let _ = connected_tx.send(false);
        info!(topic = %config.topic, "Socket task terminated");
    });

    Ok((cmd_tx, notif_rx, connected_rx))
}

/// Drives one live connection until it drops or a shutdown is requested.
async fn run_connection(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    cmd_rx: &mut mpsc::Receiver<SocketCommand>,
    notif_tx: &mpsc::Sender<SocketNotification>,
    topic: &str,
) -> Disconnect {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            // --- Outbound commands ---
            cmd = cmd_rx.recv() => match cmd {
                Some(SocketCommand::Publish(text)) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        error!(topic = %topic, error = %e, "Publish failed");
                        return Disconnect::Lost;
                    }
                }
                Some(SocketCommand::Shutdown) => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    info!(topic = %topic, "Socket shutdown requested");
                    return Disconnect::Shutdown;
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    debug!(topic = %topic, "Command channel closed, shutting down socket");
                    return Disconnect::Shutdown;
                }
            },

            // --- Inbound frames ---
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    debug!(topic = %topic, len = text.len(), "Frame received");
                    let _ = notif_tx
                        .send(SocketNotification::FrameReceived { text })
                        .await;
                }
                Some(Ok(WsMessage::Close(_))) => {
                    info!(topic = %topic, "Server closed the connection");
                    return Disconnect::Lost;
                }
                // Ping/pong are handled by the protocol layer; binary
                // frames carry nothing we speak.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(topic = %topic, error = %e, "Socket read failed");
                    return Disconnect::Lost;
                }
                None => {
                    info!(topic = %topic, "Socket stream ended");
                    return Disconnect::Lost;
                }
            },
        }
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped.
fn backoff_delay(attempt: u32, config: &SocketConfig) -> Duration {
    let exp = attempt.saturating_sub(1).min(15);
    (config.reconnect_base * 2u32.pow(exp)).min(config.reconnect_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config(port: u16) -> SocketConfig {
        let mut config = SocketConfig::new(
            format!("ws://127.0.0.1:{port}"),
            "srv1-general",
            "alice",
        );
        config.reconnect_base = Duration::from_millis(20);
        config.reconnect_max = Duration::from_millis(50);
        config
    }

    /// Gateway that echoes text frames back to each client.
    async fn spawn_echo_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(frame)) = ws.next().await {
                        if let WsMessage::Text(text) = frame {
                            if ws.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });
        port
    }

    async fn next_notification(
        rx: &mut mpsc::Receiver<SocketNotification>,
    ) -> SocketNotification {
        timeout(WAIT, rx.recv())
            .await
            .expect("notification within deadline")
            .expect("notification channel open")
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut config = test_config(0);
        config.reconnect_base = Duration::from_millis(1_000);
        config.reconnect_max = Duration::from_millis(30_000);

        assert_eq!(backoff_delay(1, &config), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(2, &config), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(3, &config), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(6, &config), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(10, &config), Duration::from_millis(30_000));
    }

    #[test]
    fn test_url_binds_topic_and_user() {
        let config = SocketConfig::new("ws://127.0.0.1:8080/", "srv1-general", "alice");
        assert_eq!(
            config.url(),
            "ws://127.0.0.1:8080/ws?channel=srv1-general&user=alice"
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_endpoint() {
        let config = SocketConfig::new("not a url", "srv1-general", "alice");
        assert!(spawn_socket(config).is_err());
    }

    #[tokio::test]
    async fn test_publish_round_trips_through_gateway() {
        let port = spawn_echo_server().await;
        let (cmd_tx, mut notif_rx, _connected) = spawn_socket(test_config(port)).unwrap();

        assert!(matches!(
            next_notification(&mut notif_rx).await,
            SocketNotification::Connected
        ));

        cmd_tx
            .send(SocketCommand::Publish("ping".to_string()))
            .await
            .unwrap();
        match next_notification(&mut notif_rx).await {
            SocketNotification::FrameReceived { text } => assert_eq!(text, "ping"),
            other => panic!("unexpected notification: {other:?}"),
        }

        cmd_tx.send(SocketCommand::Shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn test_connectivity_watch_tracks_the_link() {
        let port = spawn_echo_server().await;
        let (cmd_tx, mut notif_rx, mut connected) = spawn_socket(test_config(port)).unwrap();

        assert!(matches!(
            next_notification(&mut notif_rx).await,
            SocketNotification::Connected
        ));
        assert!(*connected.borrow());

        cmd_tx.send(SocketCommand::Shutdown).await.unwrap();
        timeout(WAIT, async {
            while *connected.borrow_and_update() {
                connected.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_connection_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // First connection: complete the handshake, then hang up.
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            drop(ws);
            // Second connection: stay up.
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (cmd_tx, mut notif_rx, _connected) = spawn_socket(test_config(port)).unwrap();

        assert!(matches!(
            next_notification(&mut notif_rx).await,
            SocketNotification::Connected
        ));
        assert!(matches!(
            next_notification(&mut notif_rx).await,
            SocketNotification::Disconnected
        ));
        assert!(matches!(
            next_notification(&mut notif_rx).await,
            SocketNotification::Connected
        ));

        cmd_tx.send(SocketCommand::Shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        // Bind and drop a listener so the port refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = test_config(port);
        config.reconnect_attempts = 2;
        let (_cmd_tx, mut notif_rx, connected) = spawn_socket(config).unwrap();

        // The task ends after exhausting its attempts, closing the channel.
        let end = timeout(WAIT, notif_rx.recv()).await.expect("task should end");
        assert!(end.is_none());
        assert!(!*connected.borrow());
    }
}
