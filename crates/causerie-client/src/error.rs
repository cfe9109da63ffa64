use thiserror::Error;

/// Errors produced by the REST persistence layer.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server rejected the bearer token.
    #[error("Authentication failed")]
    Auth,

    /// The requested channel or message does not exist.
    #[error("Record not found")]
    NotFound,

    /// Any other non-success HTTP status.
    #[error("Server responded {0}")]
    Status(u16),

    /// Connection, DNS, or protocol failure before a status arrived.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors surfaced by chat controller operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The REST call behind the operation failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The message was persisted but the live broadcast could not go out.
    /// It reaches other clients once they refetch history.
    #[error("Message persisted but not broadcast, transport is down")]
    TransportDown,

    /// No channel is open; nothing to operate on.
    #[error("No active channel")]
    NoChannel,

    /// The channel subscription could not be set up.
    #[error("Socket error: {0}")]
    Socket(String),

    /// A shared-state lock was poisoned by a panicking task.
    #[error("Internal error: {0}")]
    Internal(String),
}
