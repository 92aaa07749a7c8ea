//! Helper functions for string cleanup, window slicing, and logging.
//!
//! This module provides small helpers used throughout the pipeline:
//! - Whitespace collapsing for mined snippets
//! - UTF-8 char-boundary clamping for context windows
//! - String truncation for logging

use scraper::Selector;
use std::error::Error;

/// Parse a configured CSS selector, detaching the borrowed parse error so it
/// can propagate as `Box<dyn Error>`.
pub fn parse_selector(css: &str) -> Result<Selector, Box<dyn Error>> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e}").into())
}

/// Collapse runs of whitespace (including newlines) into single spaces.
///
/// Mined snippets and page text routinely contain hard wraps and repeated
/// spaces; collapsing keeps the CSV cells single-line and comparable.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace("a\n  b\tc"), "a b c");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clamp a byte index down to the nearest UTF-8 char boundary.
pub fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Clamp a byte index up to the nearest UTF-8 char boundary.
pub fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte
/// count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = floor_char_boundary(s, max);
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}
