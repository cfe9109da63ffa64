//! REST persistence for messages and guild rosters.
//!
//! The controller talks to these traits rather than to HTTP directly so
//! tests can swap in stubs. [`RestClient`] is the production implementation
//! against the Causerie server API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use causerie_shared::types::{ChannelKey, Member, UserTag};
use causerie_store::Message;

use crate::error::ApiError;

/// Durable message storage behind the chat controller.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Fetches the full history of a channel, oldest first.
    async fn fetch_messages(&self, channel: &ChannelKey) -> Result<Vec<Message>, ApiError>;

    /// Persists a new message and returns it with its server-issued id.
    async fn create_message(
        &self,
        channel: &ChannelKey,
        text: &str,
        author: &UserTag,
    ) -> Result<Message, ApiError>;

    /// Replaces a persisted message's text.
    async fn update_message(
        &self,
        channel: &ChannelKey,
        id: &str,
        text: &str,
    ) -> Result<(), ApiError>;

    /// Removes a persisted message.
    async fn delete_message(&self, channel: &ChannelKey, id: &str) -> Result<(), ApiError>;
}

/// Read access to guild membership, for mention completion.
#[async_trait]
pub trait Roster: Send + Sync {
    async fn fetch_members(&self, guild_id: &str) -> Result<Vec<Member>, ApiError>;
}

/// HTTP client for the server's REST API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn messages_url(&self, channel: &ChannelKey) -> String {
        format!("{}/api/messages/{}", self.base_url, channel.to_topic())
    }

    fn message_url(&self, channel: &ChannelKey, id: &str) -> String {
        format!("{}/api/messages/{}/{}", self.base_url, channel.to_topic(), id)
    }

    /// Maps non-success statuses onto the error taxonomy.
    fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status.as_u16() {
            401 => Err(ApiError::Auth),
            404 => Err(ApiError::NotFound),
            code => Err(ApiError::Status(code)),
        }
    }
}

#[async_trait]
impl Persistence for RestClient {
    async fn fetch_messages(&self, channel: &ChannelKey) -> Result<Vec<Message>, ApiError> {
        let response = self
            .http
            .get(self.messages_url(channel))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let records: Vec<MessageRecord> = Self::check(response)?.json().await?;
        Ok(records
            .into_iter()
            .map(|record| record.into_message(channel))
            .collect())
    }

    async fn create_message(
        &self,
        channel: &ChannelKey,
        text: &str,
        author: &UserTag,
    ) -> Result<Message, ApiError> {
        let response = self
            .http
            .post(self.messages_url(channel))
            .bearer_auth(&self.token)
            .json(&CreateMessageBody {
                text,
                author: &author.username,
                author_discriminator: &author.discriminator,
            })
            .send()
            .await?;
        let record: MessageRecord = Self::check(response)?.json().await?;
        Ok(record.into_message(channel))
    }

    async fn update_message(
        &self,
        channel: &ChannelKey,
        id: &str,
        text: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .patch(self.message_url(channel, id))
            .bearer_auth(&self.token)
            .json(&EditMessageBody { text })
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }

    async fn delete_message(&self, channel: &ChannelKey, id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.message_url(channel, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }
}

#[async_trait]
impl Roster for RestClient {
    async fn fetch_members(&self, guild_id: &str) -> Result<Vec<Member>, ApiError> {
        let url = format!("{}/api/guilds/{}/members", self.base_url, guild_id);
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        Ok(Self::check(response)?.json().await?)
    }
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    text: &'a str,
    author: &'a str,
    author_discriminator: &'a str,
}

#[derive(Serialize)]
struct EditMessageBody<'a> {
    text: &'a str,
}

/// Message row as the server returns it. The wire carries the channel as a
/// topic string; the store key is re-attached from the request context.
#[derive(Deserialize)]
struct MessageRecord {
    id: String,
    author: String,
    author_discriminator: String,
    text: String,
    timestamp: String,
    #[serde(default)]
    edited: bool,
    #[serde(default)]
    deleted: bool,
}

impl MessageRecord {
    fn into_message(self, channel: &ChannelKey) -> Message {
        Message {
            id: self.id,
            channel: channel.clone(),
            text: self.text,
            author: self.author,
            author_discriminator: self.author_discriminator,
            timestamp: self.timestamp,
            edited: self.edited,
            deleted: self.deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering every request with a canned response.
    async fn spawn_canned_http(status_line: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        addr
    }

    fn channel() -> ChannelKey {
        ChannelKey::guild("srv1", "general")
    }

    #[tokio::test]
    async fn test_history_fetch_binds_the_channel_key() {
        let addr = spawn_canned_http(
            "HTTP/1.1 200 OK",
            r#"[{"id":"m1","channel":"srv1-general","author":"alice","author_discriminator":"0001","text":"hi","timestamp":"2024-01-15T12:30:00Z"}]"#,
        )
        .await;
        let client = RestClient::new(format!("http://{addr}"), "token");

        let messages = client.fetch_messages(&channel()).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].channel, channel());
        assert_eq!(messages[0].author, "alice");
        assert_eq!(messages[0].author_discriminator, "0001");
        assert!(!messages[0].edited);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let addr = spawn_canned_http("HTTP/1.1 401 Unauthorized", "{}").await;
        let client = RestClient::new(format!("http://{addr}"), "expired");

        let err = client.fetch_messages(&channel()).await.unwrap_err();

        assert!(matches!(err, ApiError::Auth));
    }

    #[tokio::test]
    async fn test_missing_record_maps_to_not_found() {
        let addr = spawn_canned_http("HTTP/1.1 404 Not Found", "{}").await;
        let client = RestClient::new(format!("http://{addr}"), "token");

        let err = client.delete_message(&channel(), "ghost").await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_unreachable_server_maps_to_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = RestClient::new(format!("http://{addr}"), "token");

        let err = client.fetch_messages(&channel()).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
    }
}
