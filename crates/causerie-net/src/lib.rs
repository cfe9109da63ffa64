// WebSocket transport and per-channel session dispatch.

pub mod session;
pub mod socket;

pub use session::ChannelSession;
pub use socket::{spawn_socket, SocketCommand, SocketConfig, SocketNotification};
