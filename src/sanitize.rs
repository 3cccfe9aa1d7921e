//! Filesystem-safe names for book and chapter titles.
//!
//! A sanitized name is always a single, non-empty path segment that is valid
//! on Linux, macOS and Windows. Distinct titles that sanitize to the same
//! name (for example `A/B` and `A:B`) are disambiguated by
//! [`unique_file_names`], which appends ` (2)`, ` (3)`, ... in source order.

use std::collections::HashSet;

/// Byte budget for a sanitized segment, leaving room for a ` (NN)` suffix and
/// an audio extension inside the usual 255-byte component limit.
const MAX_SEGMENT_BYTES: usize = 240;

const FALLBACK_NAME: &str = "untitled";

const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

pub fn sanitize_file_name(title: &str) -> String {
    let stripped = title
        .chars()
        .filter_map(|ch| match ch {
            ch if ch.is_whitespace() => Some(' '),
            ch if ch.is_control() || RESERVED_CHARS.contains(&ch) => None,
            ch => Some(ch),
        })
        .collect::<String>();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ' ']).trim_start();

    let mut name = truncate_to_bytes(trimmed, MAX_SEGMENT_BYTES)
        .trim_end_matches(['.', ' '])
        .to_owned();
    if name.is_empty() {
        return FALLBACK_NAME.to_owned();
    }

    let stem = name.split('.').next().unwrap_or_default();
    let stem_len = stem.len();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        name.insert(stem_len, '_');
    }
    name
}

/// Sanitizes every title and resolves collisions so that no two results
/// name the same file, comparing case-insensitively.
pub fn unique_file_names<S: AsRef<str>>(titles: &[S]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(titles.len());

    for title in titles {
        let base = sanitize_file_name(title.as_ref());
        let mut candidate = base.clone();
        let mut n = 2_usize;
        while !taken.insert(candidate.to_lowercase()) {
            candidate = format!("{base} ({n})");
            n += 1;
        }
        out.push(candidate);
    }

    out
}

fn truncate_to_bytes(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}
