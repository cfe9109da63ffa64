//! Mention composition and rendering.
//!
//! Composition side: find the `@` query governing the cursor, rank
//! candidates from the guild roster, splice the chosen mention into the
//! draft. Rendering side: split finished message text into plain and
//! mention segments for display.

use std::ops::Range;

use causerie_shared::constants::{
    MENTION_MEMBER_LIMIT, SPECIAL_MENTION_TIME, SPECIAL_MENTION_TIME_DESC,
};
use causerie_shared::types::Member;

/// Built-in tokens offered above roster members, as `(token, description)`.
const SPECIALS: &[(&str, &str)] = &[(SPECIAL_MENTION_TIME, SPECIAL_MENTION_TIME_DESC)];

/// An `@` query found in the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    /// Byte offset of the `@` in the draft.
    pub anchor: usize,
    /// Text between the `@` and the cursor.
    pub search: String,
}

/// One row in the mention panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionCandidate {
    /// Built-in token such as `@time`, expanded client-side on display.
    Special {
        token: &'static str,
        description: &'static str,
    },
    /// A guild member.
    Member {
        id: String,
        username: String,
        discriminator: String,
    },
}

/// Finds the mention query governing `cursor`: the last `@` before the
/// cursor, sitting at the start of the draft or right after a space, with
/// no space between it and the cursor. A cursor outside the text or inside
/// a multi-byte character is clamped down to a valid boundary.
pub fn detect(text: &str, cursor: usize) -> Option<MentionQuery> {
    let cursor = clamp_to_boundary(text, cursor);
    let before = &text[..cursor];

    let anchor = before.rfind('@')?;
    if anchor > 0 && !before[..anchor].ends_with(' ') {
        return None;
    }
    let search = &before[anchor + 1..];
    if search.contains(' ') {
        return None;
    }

    Some(MentionQuery {
        anchor,
        search: search.to_string(),
    })
}

/// Ranks candidates for a search: special tokens first, then up to
/// [`MENTION_MEMBER_LIMIT`] members. Matching is a case-insensitive
/// substring test anywhere in the name, so an empty search offers
/// everything.
pub fn candidates(search: &str, members: &[Member]) -> Vec<MentionCandidate> {
    let needle = search.to_lowercase();
    let mut out = Vec::new();

    for &(token, description) in SPECIALS {
        if token.contains(&needle) {
            out.push(MentionCandidate::Special { token, description });
        }
    }
    out.extend(
        members
            .iter()
            .filter(|member| member.username.to_lowercase().contains(&needle))
            .take(MENTION_MEMBER_LIMIT)
            .map(|member| MentionCandidate::Member {
                id: member.id.clone(),
                username: member.username.clone(),
                discriminator: member.discriminator.clone(),
            }),
    );
    out
}

/// Splices `candidate` into the draft, replacing everything from the `@`
/// through the search text with the canonical mention plus a trailing
/// space. Returns the new draft and the cursor position after that space.
///
/// `query` is expected to come from [`detect`] on the same draft; stale
/// offsets are clamped rather than trusted.
pub fn insert(text: &str, query: &MentionQuery, candidate: &MentionCandidate) -> (String, usize) {
    let mention = match candidate {
        MentionCandidate::Special { token, .. } => format!("@{token} "),
        MentionCandidate::Member {
            username,
            discriminator,
            ..
        } => {
            if discriminator.is_empty() {
                format!("@{username} ")
            } else {
                format!("@{username}#{discriminator} ")
            }
        }
    };

    let anchor = clamp_to_boundary(text, query.anchor);
    let end = clamp_to_boundary(text, anchor + 1 + query.search.len());

    let mut out = String::with_capacity(text.len() + mention.len());
    out.push_str(&text[..anchor]);
    out.push_str(&mention);
    let cursor = out.len();
    out.push_str(&text[end..]);
    (out, cursor)
}

pub(crate) fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// One run of finished message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Mention {
        username: &'a str,
        discriminator: &'a str,
    },
}

/// Lazily splits message text into plain and mention segments.
///
/// A mention is `@`, one or more word characters, `#`, and exactly four
/// digits, matched anywhere in the text. Never yields an empty `Plain`.
pub fn segments(text: &str) -> Segments<'_> {
    Segments {
        text,
        pos: 0,
        pending: None,
    }
}

pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
    pending: Option<Segment<'a>>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }
        if self.pos >= self.text.len() {
            return None;
        }
        match find_mention(self.text, self.pos) {
            Some(found) => {
                let mention = Segment::Mention {
                    username: &self.text[found.username],
                    discriminator: &self.text[found.discriminator],
                };
                let plain_start = self.pos;
                self.pos = found.end;
                if found.start > plain_start {
                    self.pending = Some(mention);
                    Some(Segment::Plain(&self.text[plain_start..found.start]))
                } else {
                    Some(mention)
                }
            }
            None => {
                let rest = &self.text[self.pos..];
                self.pos = self.text.len();
                Some(Segment::Plain(rest))
            }
        }
    }
}

struct FoundMention {
    start: usize,
    username: Range<usize>,
    discriminator: Range<usize>,
    end: usize,
}

/// Byte scan for the next mention at or after `from`. All boundaries land
/// on ASCII bytes, so the ranges are always valid `str` slices.
fn find_mention(text: &str, from: usize) -> Option<FoundMention> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'@' {
            let mut j = i + 1;
            while j < bytes.len() && is_word_byte(bytes[j]) {
                j += 1;
            }
            if j > i + 1
                && j + 5 <= bytes.len()
                && bytes[j] == b'#'
                && bytes[j + 1..j + 5].iter().all(u8::is_ascii_digit)
            {
                return Some(FoundMention {
                    start: i,
                    username: i + 1..j,
                    discriminator: j + 1..j + 5,
                    end: j + 5,
                });
            }
        }
        i += 1;
    }
    None
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, username: &str) -> Member {
        Member {
            id: id.to_string(),
            username: username.to_string(),
            discriminator: "0001".to_string(),
        }
    }

    #[test]
    fn test_detect_query_under_cursor() {
        let query = detect("hello @al", 9).unwrap();
        assert_eq!(query.anchor, 6);
        assert_eq!(query.search, "al");
    }

    #[test]
    fn test_detect_at_draft_start() {
        let query = detect("@al", 3).unwrap();
        assert_eq!(query.anchor, 0);
        assert_eq!(query.search, "al");
    }

    #[test]
    fn test_detect_bare_at_is_an_empty_query() {
        let query = detect("hey @", 5).unwrap();
        assert_eq!(query.anchor, 4);
        assert_eq!(query.search, "");
    }

    #[test]
    fn test_detect_requires_space_before_at() {
        assert_eq!(detect("a@b", 3), None);
        assert_eq!(detect("mail@host", 9), None);
    }

    #[test]
    fn test_detect_rejects_space_after_at() {
        assert_eq!(detect("hello @al ice", 13), None);
    }

    #[test]
    fn test_detect_without_at_is_none() {
        assert_eq!(detect("hello", 5), None);
        assert_eq!(detect("", 0), None);
    }

    #[test]
    fn test_detect_uses_last_at_before_cursor() {
        let query = detect("@a @b", 5).unwrap();
        assert_eq!(query.anchor, 3);
        assert_eq!(query.search, "b");
    }

    #[test]
    fn test_detect_only_looks_before_the_cursor() {
        // Cursor sits between "@al" and the tail; the tail is invisible.
        let query = detect("hey @al tail", 7).unwrap();
        assert_eq!(query.search, "al");
    }

    #[test]
    fn test_detect_clamps_wild_cursor() {
        let query = detect("héllo @a", 100).unwrap();
        assert_eq!(query.anchor, 7);
        assert_eq!(query.search, "a");

        // Cursor inside the two-byte é clamps down to before it.
        assert_eq!(detect("héllo @a", 2), None);
    }

    #[test]
    fn test_candidates_rank_specials_first() {
        let members = vec![member("1", "alice"), member("2", "bob")];
        let out = candidates("i", &members);

        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], MentionCandidate::Special { token: "time", .. }));
        assert!(matches!(&out[1], MentionCandidate::Member { username, .. } if username == "alice"));
    }

    #[test]
    fn test_candidates_match_case_insensitively() {
        let members = vec![member("1", "Alice")];
        let out = candidates("AL", &members);

        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], MentionCandidate::Member { username, .. } if username == "Alice"));
    }

    #[test]
    fn test_candidates_cap_member_rows() {
        let members: Vec<Member> = (1..=7)
            .map(|n| member(&n.to_string(), &format!("user{n}")))
            .collect();
        let out = candidates("user", &members);

        assert_eq!(out.len(), MENTION_MEMBER_LIMIT);
        assert!(matches!(&out[0], MentionCandidate::Member { username, .. } if username == "user1"));
    }

    #[test]
    fn test_candidates_empty_search_offers_everything() {
        let members = vec![member("1", "alice")];
        let out = candidates("", &members);

        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], MentionCandidate::Special { .. }));
    }

    #[test]
    fn test_insert_replaces_query_with_canonical_mention() {
        let text = "hey @al";
        let query = detect(text, 7).unwrap();
        let candidate = MentionCandidate::Member {
            id: "1".to_string(),
            username: "alice".to_string(),
            discriminator: "0001".to_string(),
        };

        let (out, cursor) = insert(text, &query, &candidate);

        assert_eq!(out, "hey @alice#0001 ");
        assert_eq!(cursor, out.len());
    }

    #[test]
    fn test_insert_keeps_the_tail_after_the_cursor() {
        let text = "hey @al tail";
        let query = detect(text, 7).unwrap();
        let candidate = MentionCandidate::Special {
            token: "time",
            description: "",
        };

        let (out, cursor) = insert(text, &query, &candidate);

        assert_eq!(out, "hey @time  tail");
        assert_eq!(cursor, "hey @time ".len());
    }

    #[test]
    fn test_segments_plain_only() {
        let out: Vec<Segment> = segments("hello there").collect();
        assert_eq!(out, [Segment::Plain("hello there")]);
    }

    #[test]
    fn test_segments_empty_text_yields_nothing() {
        assert_eq!(segments("").count(), 0);
    }

    #[test]
    fn test_segments_split_around_a_mention() {
        let out: Vec<Segment> = segments("hey @bob#1234 check this").collect();
        assert_eq!(
            out,
            [
                Segment::Plain("hey "),
                Segment::Mention {
                    username: "bob",
                    discriminator: "1234"
                },
                Segment::Plain(" check this"),
            ]
        );
    }

    #[test]
    fn test_segments_adjacent_mentions() {
        let out: Vec<Segment> = segments("@a#0001@b#0002").collect();
        assert_eq!(
            out,
            [
                Segment::Mention {
                    username: "a",
                    discriminator: "0001"
                },
                Segment::Mention {
                    username: "b",
                    discriminator: "0002"
                },
            ]
        );
    }

    #[test]
    fn test_segments_discriminator_is_exactly_four_digits() {
        let out: Vec<Segment> = segments("@bob#12345").collect();
        assert_eq!(
            out,
            [
                Segment::Mention {
                    username: "bob",
                    discriminator: "1234"
                },
                Segment::Plain("5"),
            ]
        );

        let out: Vec<Segment> = segments("@bob#123").collect();
        assert_eq!(out, [Segment::Plain("@bob#123")]);
    }

    #[test]
    fn test_segments_match_mid_word() {
        let out: Vec<Segment> = segments("x@bob#1234").collect();
        assert_eq!(
            out,
            [
                Segment::Plain("x"),
                Segment::Mention {
                    username: "bob",
                    discriminator: "1234"
                },
            ]
        );
    }

    #[test]
    fn test_segments_with_multibyte_text() {
        let out: Vec<Segment> = segments("héllo @bob#1234 ça va").collect();
        assert_eq!(
            out,
            [
                Segment::Plain("héllo "),
                Segment::Mention {
                    username: "bob",
                    discriminator: "1234"
                },
                Segment::Plain(" ça va"),
            ]
        );
    }
}
