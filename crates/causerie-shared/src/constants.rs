/// Application name
pub const APP_NAME: &str = "Causerie";

/// How long an inbound typing signal keeps a user in the active set (ms)
pub const TYPING_TTL_MS: u64 = 3_000;

/// Minimum gap between outbound typing signals while composing (ms)
pub const TYPING_SIGNAL_MS: u64 = 3_000;

/// Maximum member candidates offered by mention autocomplete
pub const MENTION_MEMBER_LIMIT: usize = 5;

/// Built-in mention token expanded client-side
pub const SPECIAL_MENTION_TIME: &str = "time";
pub const SPECIAL_MENTION_TIME_DESC: &str =
    "Refer to a time dynamically in the viewer's time zone";

/// Socket reconnect backoff: first delay (ms)
pub const RECONNECT_BASE_MS: u64 = 1_000;

/// Socket reconnect backoff: ceiling (ms)
pub const RECONNECT_MAX_MS: u64 = 30_000;

/// Socket reconnect: consecutive failures before giving up
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;
