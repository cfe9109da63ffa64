// Types and wire protocol shared by every Causerie crate.

pub mod constants;
pub mod protocol;
pub mod types;

pub use protocol::ChannelEvent;
pub use types::{ChannelKey, Member, UserTag};
