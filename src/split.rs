//! Bounded text splitter with a break-preference chain.
//!
//! Splits source text into ordered [`Segment`]s that respect a size limit
//! measured either in bytes or in Unicode code points. Within each
//! limit-sized candidate the cut lands after the last sentence-ending
//! break character, else after the last newline, else at the limit itself
//! (hard cut). The break marker always stays with the segment that
//! precedes the cut, so concatenating segments in index order reproduces
//! the input byte for byte.
//!
//! The bytes variant never splits inside a multi-byte character: the
//! candidate end is aligned backward to a `char` boundary, and widened to
//! one full character when the limit is narrower than the first character.

use crate::models::Segment;

/// Size bound for [`split_text`], in the unit the caller cares about.
#[derive(Debug, Clone, Copy)]
pub enum SplitLimit {
    Bytes(usize),
    Chars(usize),
}

/// Default sentence-ending break set. The provider reads one segment per
/// request, so cuts land on sentence ends in both Japanese and Latin text.
pub const SENTENCE_ENDINGS: &[char] = &['。', '．', '.', '!', '?', '！', '？'];

/// Split `text` into 1-indexed segments of at most `limit` units each.
///
/// Empty input yields no segments. A zero limit disables splitting and
/// yields the whole text as a single segment. No segment is ever empty.
pub fn split_text(text: &str, limit: SplitLimit, breaks: &[char]) -> Vec<Segment> {
    if text.is_empty() {
        return Vec::new();
    }

    let max = match limit {
        SplitLimit::Bytes(n) | SplitLimit::Chars(n) => n,
    };
    if max == 0 {
        return vec![Segment {
            index: 1,
            text: text.to_string(),
        }];
    }

    let mut segments = Vec::new();
    let mut remaining = text;

    loop {
        let candidate_end = candidate_end(remaining, limit);
        if candidate_end == remaining.len() {
            segments.push(Segment {
                index: segments.len() + 1,
                text: remaining.to_string(),
            });
            break;
        }

        let candidate = &remaining[..candidate_end];
        let cut = last_break(candidate, breaks)
            .or_else(|| candidate.rfind('\n').map(|pos| pos + 1))
            .unwrap_or(candidate_end);

        segments.push(Segment {
            index: segments.len() + 1,
            text: remaining[..cut].to_string(),
        });
        remaining = &remaining[cut..];
    }

    segments
}

/// Prefix of `s` containing at most `n` code points.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Byte offset of the candidate slice end for the current limit unit.
/// Returns `remaining.len()` when the whole remainder fits.
fn candidate_end(remaining: &str, limit: SplitLimit) -> usize {
    match limit {
        SplitLimit::Bytes(n) => {
            if remaining.len() <= n {
                return remaining.len();
            }
            let mut end = n;
            while !remaining.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                // Limit is narrower than the first character; a segment
                // must still hold at least one whole character.
                end = remaining
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(remaining.len());
            }
            end
        }
        SplitLimit::Chars(n) => match remaining.char_indices().nth(n) {
            Some((idx, _)) => idx,
            None => remaining.len(),
        },
    }
}

/// Byte offset just past the last break character in `candidate`.
fn last_break(candidate: &str, breaks: &[char]) -> Option<usize> {
    candidate
        .char_indices()
        .rev()
        .find(|(_, c)| breaks.contains(c))
        .map(|(pos, c)| pos + c.len_utf8())
}
