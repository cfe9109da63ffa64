use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use causerie_shared::constants::TYPING_TTL_MS;
use causerie_shared::types::{ChannelKey, UserTag};

/// Handle shared between the session dispatch task and the embedding app.
pub type SharedTypingTracker = Arc<Mutex<TypingTracker>>;

// Expiry is data, not a timer callback: every query takes an explicit `now`
// so tests drive the clock without sleeping.
#[derive(Debug, Clone)]
struct TypingEntry {
    user: UserTag,
    expires_at: Instant,
}

/// Ephemeral "user X is typing" facts per channel, ordered by arrival.
#[derive(Debug)]
pub struct TypingTracker {
    local_user: UserTag,
    ttl: Duration,
    entries: HashMap<ChannelKey, Vec<TypingEntry>>,
}

impl TypingTracker {
    pub fn new(local_user: UserTag) -> Self {
        Self {
            local_user,
            ttl: Duration::from_millis(TYPING_TTL_MS),
            entries: HashMap::new(),
        }
    }

    /// Records a typing signal received at `now`. The local user's own echo
    /// is never added. A user already active is rescheduled in place: N
    /// signals yield one visible entry, and arrival order is kept.
    pub fn record(&mut self, channel: &ChannelKey, user: UserTag, now: Instant) {
        if user == self.local_user {
            return;
        }
        let expires_at = now + self.ttl;
        let entries = self.entries.entry(channel.clone()).or_default();
        match entries.iter_mut().find(|e| e.user == user) {
            Some(entry) => entry.expires_at = expires_at,
            None => entries.push(TypingEntry { user, expires_at }),
        }
    }

    /// Drops a user's entry immediately. A message from a user supersedes
    /// their typing state, whatever time remains on it.
    pub fn clear(&mut self, channel: &ChannelKey, user: &UserTag) {
        if let Some(entries) = self.entries.get_mut(channel) {
            entries.retain(|e| &e.user != user);
        }
    }

    /// Display names of users still active at `now`, in arrival order, with
    /// discriminators stripped for presentation. Pure read: expired entries
    /// are filtered out but not removed (see [`TypingTracker::sweep`]).
    pub fn active_typers(&self, channel: &ChannelKey, now: Instant) -> Vec<String> {
        self.entries
            .get(channel)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.expires_at > now)
                    .map(|e| e.user.username.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Count-driven indicator line. The thresholds are a contract:
    /// 0 → nothing, 1 → "<name> is typing…", 2 → "<a> and <b> are typing…",
    /// 3 or more → "Several people are typing…".
    pub fn banner(&self, channel: &ChannelKey, now: Instant) -> Option<String> {
        let names = self.active_typers(channel, now);
        match names.as_slice() {
            [] => None,
            [name] => Some(format!("{name} is typing…")),
            [a, b] => Some(format!("{a} and {b} are typing…")),
            _ => Some("Several people are typing…".to_string()),
        }
    }

    /// Removes entries past their expiry so long-idle channels do not pin
    /// memory. Runs from the session's housekeeping tick.
    pub fn sweep(&mut self, now: Instant) {
        self.entries.retain(|_, entries| {
            entries.retain(|e| e.expires_at > now);
            !entries.is_empty()
        });
    }
}
