//! Highlight tag handling

use serde::Serialize;

/// Opening tag the cluster wraps matched terms in
pub const PRE_TAG: &str = "<em class=\"highlight\">";

/// Closing tag of a highlighted term
pub const POST_TAG: &str = "</em>";

/// Span of a highlighted term, 1-based and inclusive, in the untagged text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

/// A highlighted fragment with its tags replaced by offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedText {
    pub value: String,
    pub matches: Vec<Match>,
}

/// Strip highlight tags, returning the plain text and the span of each
/// highlighted term. Tags are removed in one left-to-right pass, so every
/// offset refers to the fully stripped text; nested spans are reported
/// alongside the spans that enclose them, ordered by start.
pub fn find_matches(tagged: &str) -> HighlightedText {
    let mut value = String::with_capacity(tagged.len());
    let mut matches = Vec::new();
    let mut open = Vec::new();
    let mut rest = tagged;

    loop {
        let next_open = rest.find(PRE_TAG);
        let next_close = rest.find(POST_TAG);
        let (at, is_open) = match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => (o, true),
            (Some(o), None) => (o, true),
            (_, Some(c)) => (c, false),
            (None, None) => break,
        };

        value.push_str(&rest[..at]);
        if is_open {
            open.push(value.len());
            rest = &rest[at + PRE_TAG.len()..];
        } else {
            // a stray closing tag is dropped
            if let Some(start) = open.pop() {
                push_span(&mut matches, start, value.len());
            }
            rest = &rest[at + POST_TAG.len()..];
        }
    }
    value.push_str(rest);

    // unterminated highlights run to the end of the text
    while let Some(start) = open.pop() {
        push_span(&mut matches, start, value.len());
    }

    matches.sort_by_key(|m| (m.start, m.end));
    HighlightedText { value, matches }
}

fn push_span(matches: &mut Vec<Match>, start: usize, end: usize) {
    if end > start {
        matches.push(Match {
            start: start + 1,
            end,
        });
    }
}
