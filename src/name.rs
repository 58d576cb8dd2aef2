//! Artifact naming: derive filesystem-safe names from untrusted subjects.
//!
//! Subject lines come from the wild and end up as on-disk artifact names,
//! so everything a common filesystem rejects is replaced before use. The
//! transform is idempotent: sanitizing an already-sanitized name returns
//! it unchanged.

/// Maximum artifact name length, in Unicode code points.
const MAX_NAME_CHARS: usize = 100;

/// Characters replaced with `_` on top of control characters.
const INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Sanitize a raw name for filesystem use.
///
/// Rules, in order: replace invalid and control characters with `_`, drop
/// U+FFFD left behind by lossy decoding, collapse runs of `_`, trim
/// leading/trailing whitespace and `_`, truncate to 100 code points, then
/// trim the tail again so truncation cannot expose a trailing separator,
/// period, or space (reserved-name compatibility). Never errors; an
/// all-invalid input simply becomes empty.
pub fn sanitize_file_name(raw: &str) -> String {
    let mut replaced = String::with_capacity(raw.len());
    let mut last_was_underscore = false;
    for c in raw.chars() {
        if c == '\u{FFFD}' {
            continue;
        }
        let mapped = if INVALID.contains(&c) || c.is_control() {
            '_'
        } else {
            c
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        replaced.push(mapped);
    }

    let trimmed = replaced.trim_matches(|c: char| c == '_' || c.is_whitespace());
    let truncated = crate::split::truncate_chars(trimmed, MAX_NAME_CHARS);
    truncated
        .trim_end_matches(|c: char| c == '.' || c == '_' || c.is_whitespace())
        .to_string()
}

/// Artifact base name for a message: the sanitized subject, or the stable
/// message id when the subject sanitizes to nothing.
pub fn artifact_base_name(subject: &str, message_id: &str) -> String {
    let name = sanitize_file_name(subject);
    if name.is_empty() {
        message_id.to_string()
    } else {
        name
    }
}
