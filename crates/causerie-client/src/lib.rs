pub mod api;
pub mod compose;
pub mod controller;
pub mod error;
pub mod mention;
pub mod render;

use tracing_subscriber::{fmt, EnvFilter};

use causerie_shared::constants::APP_NAME;

pub use api::{Persistence, RestClient, Roster};
pub use compose::{ComposeKey, ComposeState, KeyOutcome};
pub use controller::{ChatController, ClientConfig};
pub use error::{ApiError, ChatError};
pub use mention::{segments, MentionCandidate, MentionQuery, Segment};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// default filter. Call once, before the first controller is built.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("causerie_client=debug,causerie_net=debug,causerie_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("{APP_NAME} client core initialised");
}
