//! ASCII case-insensitive substring search.
//!
//! Only ASCII letters fold; every other byte (including UTF-8 continuation
//! bytes) must match exactly. Because the needle is valid UTF-8 and matched
//! byte-for-byte outside ASCII letters, every returned range lies on char
//! boundaries of the haystack.

use memchr::{memchr, memchr2};
use std::ops::Range;

pub fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    find_ignore_ascii_case(haystack, needle, 0).is_some()
}

/// Byte offset of the first match at or after `from`.
pub fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    let n = needle.len();
    if n == 0 {
        return None;
    }
    let hay_len = hay.len();
    if hay_len < n || from > hay_len - n {
        return None;
    }
    let first = needle[0];
    let (a, b) = if first.is_ascii_alphabetic() {
        (first.to_ascii_lowercase(), first.to_ascii_uppercase())
    } else {
        (first, first)
    };
    let mut i = from;
    while i + n <= hay_len {
        let rel = if a == b {
            memchr(a, &hay[i..])
        } else {
            memchr2(a, b, &hay[i..])
        };
        let pos = i + rel?;
        if pos + n <= hay_len && hay[pos..pos + n].eq_ignore_ascii_case(needle) {
            return Some(pos);
        }
        i = pos + 1;
    }
    None
}

/// Every non-overlapping match, left to right.
pub fn match_ranges_ignore_ascii_case(haystack: &str, needle: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(pos) = find_ignore_ascii_case(haystack, needle, from) {
        out.push(pos..pos + needle.len());
        from = pos + needle.len();
    }
    out
}
