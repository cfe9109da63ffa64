//! Display helpers for the message list.

use chrono::{DateTime, Local};

/// Renders a wire timestamp for display. RFC 3339 values become the local
/// wall clock as `HH:MM`; anything else is shown as received, since older
/// server builds stored preformatted clock strings.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Local).format("%H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}
