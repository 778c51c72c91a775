//! Utility functions for text handling and file system checks.
//!
//! This module provides helper functions used throughout the crate:
//! - Slug derivation for post URLs
//! - Word counting and read-time estimation
//! - Whitespace normalization for scraped text
//! - String truncation for logging
//! - File system validation for the store directory

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Average reading speed used for read-time estimates.
pub const WORDS_PER_MINUTE: usize = 200;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```
/// use newswire::utils::truncate_for_log;
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Convert a title to a URL-friendly slug.
///
/// Lowercases the text, drops everything except ASCII letters, digits,
/// whitespace and hyphens, turns whitespace runs into single hyphens and
/// trims leading/trailing hyphens. Titles with nothing usable become `"post"`.
///
/// No uniqueness suffix is added here; the store does that on insert.
///
/// # Examples
///
/// ```
/// use newswire::utils::slugify;
/// assert_eq!(slugify("Getting Started with Next.js 15!"), "getting-started-with-nextjs-15");
/// ```
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = WHITESPACE_RUN.replace_all(&kept, "-");
    let collapsed = HYPHEN_RUN.replace_all(&hyphenated, "-");
    let slug = collapsed.trim_matches('-');
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug.to_string()
    }
}

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated reading time in minutes, never less than one.
pub fn read_time(text: &str) -> u32 {
    let minutes = word_count(text).div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Normalize whitespace in scraped text.
///
/// Collapses runs of spaces and tabs into one space, trims every line and
/// collapses any run of blank lines into a single blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let spaced = HORIZONTAL_SPACE.replace_all(text, " ");
    let trimmed_lines = spaced
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_LINES
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    // Sync probe via std fs keeps the error surface simple
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Store directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("…(+18 bytes)"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("Getting Started with Next.js 15!"),
            "getting-started-with-nextjs-15"
        );
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("Special@#$Characters"), "specialcharacters");
        assert_eq!(slugify("  -Leading and trailing- "), "leading-and-trailing");
        assert_eq!(slugify("Trump-Xi 'situationship'"), "trump-xi-situationship");
        assert_eq!(slugify("A -- B"), "a-b");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify("!!!"), "post");
        assert_eq!(slugify("日本語"), "post");
    }

    #[test]
    fn test_read_time() {
        assert_eq!(read_time(""), 1);
        assert_eq!(read_time("one two three"), 1);
        assert_eq!(read_time(&"word ".repeat(200)), 1);
        assert_eq!(read_time(&"word ".repeat(201)), 2);
        assert_eq!(read_time(&"word ".repeat(1000)), 5);
    }

    #[test]
    fn test_read_time_is_stable() {
        let text = "lorem ipsum ".repeat(321);
        assert_eq!(read_time(&text), read_time(&text));
    }

    #[test]
    fn test_normalize_whitespace() {
        let raw = "  First   line\t\there \n\n\n\n   Second line  \n \n \nThird";
        assert_eq!(
            normalize_whitespace(raw),
            "First line here\n\nSecond line\n\nThird"
        );
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
