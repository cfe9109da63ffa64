//! Message composer state: the draft, its cursor, the mention panel, and
//! the outbound typing throttle.
//!
//! The embedding UI feeds text and key events in and reads the panel state
//! back out; nothing here touches the network.

use std::time::{Duration, Instant};

use causerie_shared::constants::TYPING_SIGNAL_MS;
use causerie_shared::types::Member;

use crate::mention::{self, MentionCandidate, MentionQuery};

/// Keys the composer may capture while the mention panel is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeKey {
    Up,
    Down,
    Enter,
    Tab,
    Escape,
}

/// What the composer did with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Panel closed; the key keeps its default meaning.
    Ignored,
    /// The key moved the selection or dismissed the panel.
    Handled,
    /// A mention was spliced into the draft.
    Inserted,
}

/// Draft state for one message input.
#[derive(Debug, Default)]
pub struct ComposeState {
    buffer: String,
    cursor: usize,
    selected: usize,
    dismissed: bool,
    last_typing_signal: Option<Instant>,
}

impl ComposeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replaces the draft. Any mention dismissal is forgotten and the panel
    /// selection starts over.
    pub fn set_text(&mut self, text: impl Into<String>, cursor: usize) {
        self.buffer = text.into();
        self.cursor = mention::clamp_to_boundary(&self.buffer, cursor);
        self.selected = 0;
        self.dismissed = false;
    }

    pub fn move_cursor(&mut self, cursor: usize) {
        self.cursor = mention::clamp_to_boundary(&self.buffer, cursor);
        self.selected = 0;
        self.dismissed = false;
    }

    /// The mention query under the cursor, unless the panel was dismissed.
    pub fn mention(&self) -> Option<MentionQuery> {
        if self.dismissed {
            return None;
        }
        mention::detect(&self.buffer, self.cursor)
    }

    /// Panel rows for the current query; empty when the panel is closed.
    pub fn candidates(&self, members: &[Member]) -> Vec<MentionCandidate> {
        self.mention()
            .map(|query| mention::candidates(&query.search, members))
            .unwrap_or_default()
    }

    /// Highlighted row, normalized into a panel of `len` rows.
    pub fn selected_index(&self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.selected % len)
    }

    /// Routes a key press. Returns [`KeyOutcome::Ignored`] whenever the
    /// panel is closed so Enter falls through to message submission.
    pub fn key(&mut self, key: ComposeKey, members: &[Member]) -> KeyOutcome {
        let Some(query) = self.mention() else {
            return KeyOutcome::Ignored;
        };
        let candidates = mention::candidates(&query.search, members);
        if candidates.is_empty() {
            return KeyOutcome::Ignored;
        }

        // The roster can shift under a stale selection; normalize first.
        let len = candidates.len();
        let current = self.selected % len;

        match key {
            ComposeKey::Up => {
                self.selected = (current + len - 1) % len;
                KeyOutcome::Handled
            }
            ComposeKey::Down => {
                self.selected = (current + 1) % len;
                KeyOutcome::Handled
            }
            ComposeKey::Enter | ComposeKey::Tab => {
                let (buffer, cursor) = mention::insert(&self.buffer, &query, &candidates[current]);
                self.buffer = buffer;
                self.cursor = cursor;
                self.selected = 0;
                KeyOutcome::Inserted
            }
            ComposeKey::Escape => {
                self.dismissed = true;
                KeyOutcome::Handled
            }
        }
    }

    /// True when an outbound typing signal should go out now. Throttled so
    /// continuous typing signals at most once per window.
    pub fn typing_signal_due(&mut self, now: Instant) -> bool {
        let due = match self.last_typing_signal {
            Some(last) => now.duration_since(last) >= Duration::from_millis(TYPING_SIGNAL_MS),
            None => true,
        };
        if due {
            self.last_typing_signal = Some(now);
        }
        due
    }

    /// Empties the draft after a send. The typing throttle is left alone;
    /// the window applies across messages.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.selected = 0;
        self.dismissed = false;
    }
}
