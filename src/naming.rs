//! Test identity and object naming.
//!
//! Kubernetes object names must be lowercase RFC 1123 labels, so test names
//! such as `deployment_tests::test_deploy_nginx` or `TestDeployNginx` are
//! turned into hyphenated slugs before they are used as namespace prefixes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Longest slug, hash suffix included. Leaves room for the timestamp and
/// `-<kind>-<n>` suffixes inside the 63 character label limit.
pub const MAX_SLUG_LEN: usize = 40;

/// Hex digits of the name hash appended to every slug.
const HASH_LEN: usize = 8;

/// Slug used when a test name has no usable characters.
const FALLBACK_SLUG: &str = "test";

/// Convert an arbitrary string to a lowercase hyphenated slug.
///
/// Word boundaries are inserted between lower and upper case letters, at the
/// end of an acronym (`JSONData` becomes `json-data`), and between letters
/// and digits. Any character that is not ASCII alphanumeric is a separator.
pub fn to_snake(input: &str) -> String {
    let chars: Vec<char> = input.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            push_separator(&mut out);
            continue;
        }

        let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
        let next = chars.get(i + 1).copied();
        if let Some(prev) = prev
            && is_boundary(prev, c, next)
        {
            push_separator(&mut out);
        }

        out.push(c.to_ascii_lowercase());
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn push_separator(out: &mut String) {
    if !out.is_empty() && !out.ends_with('-') {
        out.push('-');
    }
}

fn is_boundary(prev: char, c: char, next: Option<char>) -> bool {
    if !prev.is_ascii_alphanumeric() {
        return false;
    }
    if c.is_ascii_uppercase() {
        // fooBar, foo2Bar
        if prev.is_ascii_lowercase() || prev.is_ascii_digit() {
            return true;
        }
        // JSONData: split before the last capital of an acronym
        return prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase());
    }
    if c.is_ascii_digit() {
        return prev.is_ascii_alphabetic();
    }
    prev.is_ascii_digit()
}

/// Derive the slug for a test name.
///
/// Rust test paths use `::` and Go-style names carry a `Test` prefix; both
/// are normalized away. Slugging is lossy (`TestFoo` and `test_foo` read the
/// same), so every slug ends in a hash of the full name, and the readable
/// part is truncated to keep the whole slug within [`MAX_SLUG_LEN`].
pub fn test_slug(test_name: &str) -> String {
    let last = test_name.rsplit("::").next().unwrap_or(test_name);
    let prefix_stripped = last
        .strip_prefix("Test")
        .or_else(|| last.strip_prefix("test_"))
        .unwrap_or(last);

    // Keep module path segments ahead of the function name for uniqueness.
    let module = test_name
        .strip_suffix(last)
        .map(|m| m.trim_end_matches(':'))
        .unwrap_or_default();
    let joined = if module.is_empty() {
        prefix_stripped.to_string()
    } else {
        format!("{module}-{prefix_stripped}")
    };

    let readable = match to_snake(&joined) {
        s if s.is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    };
    let keep = MAX_SLUG_LEN - HASH_LEN - 1;
    let truncated: String = readable.chars().take(keep).collect();
    format!("{}-{}", truncated.trim_end_matches('-'), name_hash(test_name))
}

fn name_hash(test_name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    test_name.hash(&mut hasher);
    format!("{:0width$x}", hasher.finish() & 0xffff_ffff, width = HASH_LEN)
}

/// Build the unique test ID from a test name and a Unix timestamp.
pub fn test_id(test_name: &str, unix_seconds: i64) -> String {
    format!("{}-{}", test_slug(test_name), unix_seconds)
}

/// Build an object name `<id>-<kind>-<n>`.
pub fn object_name(test_id: &str, kind: &str, n: u64) -> String {
    format!("{test_id}-{kind}-{n}")
}
