//! # causerie-store
//!
//! In-memory state for the messaging core: per-channel ordered message
//! sequences with an identity-keyed idempotent merge, and ephemeral typing
//! presence with data-driven expiry.
//!
//! Nothing in this crate touches the network. The structures are mutated by
//! the channel session's dispatch task and read by the embedding
//! application, so both are exposed behind `Arc<Mutex<_>>` aliases.

pub mod models;
pub mod store;
pub mod typing;

pub use models::Message;
pub use store::{MessageStore, SharedMessageStore};
pub use typing::{SharedTypingTracker, TypingTracker};
