//! Consumer name normalization.
//!
//! The gateway only accepts names matching `^[a-z0-9\-_:]+$`. Names are also
//! the path segment for update/delete, so every name headed upstream goes
//! through [`normalize_name`].

use regex::Regex;
use std::sync::LazyLock;

/// Name pattern enforced by the gateway.
pub const CONSUMER_NAME_PATTERN: &str = r"^[a-z0-9\-_:]+$";

static CONSUMER_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CONSUMER_NAME_PATTERN).expect("invalid consumer name pattern"));

/// Returns true if `name` is already acceptable upstream.
pub fn is_valid_name(name: &str) -> bool {
    CONSUMER_NAME_REGEX.is_match(name)
}

/// Coerce any string into the gateway naming scheme.
///
/// Valid names pass through unchanged. Otherwise ASCII letters are lowercased
/// and every character outside `[a-z0-9\-_:]` becomes `-`. Total: the empty
/// string maps to itself and is left for the gateway to reject.
pub fn normalize_name(raw: &str) -> String {
    if is_valid_name(raw) {
        return raw.to_string();
    }

    raw.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' | ':' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect()
}
