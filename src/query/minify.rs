//! Compact encoding of rendered query templates

use super::QueryError;
use serde_json::Value;

/// Separator between header and body lines in a rendered multi-search
pub const SENTINEL: &str = "$$";

/// Re-encode one rendered JSON document without layout whitespace.
///
/// Parsing through `serde_json` also rejects a template that rendered
/// something other than a single JSON value.
pub fn minify(rendered: &str) -> Result<String, QueryError> {
    encode_line(rendered, 1)
}

/// Split a rendered multi-search on its sentinels and emit one compact JSON
/// document per line.
///
/// Only a sentinel between tokens frames a line; `$$` inside a string
/// literal (a user's search term, say) is left alone. Blank segments are
/// skipped.
pub fn frame_lines(rendered: &str) -> Result<String, QueryError> {
    let mut wire = String::with_capacity(rendered.len());
    let segments = split_frames(rendered)
        .into_iter()
        .filter(|segment| !segment.trim().is_empty());

    for (idx, segment) in segments.enumerate() {
        wire.push_str(&encode_line(segment, idx + 1)?);
        wire.push('\n');
    }
    Ok(wire)
}

fn encode_line(segment: &str, line: usize) -> Result<String, QueryError> {
    let value: Value = serde_json::from_str(segment)
        .map_err(|source| QueryError::InvalidJson { line, source })?;
    Ok(value.to_string())
}

/// Byte ranges between sentinels that sit outside string literals
fn split_frames(rendered: &str) -> Vec<&str> {
    let bytes = rendered.as_bytes();
    let sentinel = SENTINEL.as_bytes();
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if bytes[i..].starts_with(sentinel) {
            segments.push(&rendered[segment_start..i]);
            i += sentinel.len();
            segment_start = i;
            continue;
        }
        i += 1;
    }
    segments.push(&rendered[segment_start..]);
    segments
}
