//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Usernames: letters, digits, dot, underscore, hyphen
static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("valid username regex"));

/// Validate a username
pub fn validate_username(username: &str) -> bool {
    (3..=50).contains(&username.len()) && USERNAME_REGEX.is_match(username)
}

/// Normalize a credential for lookup: surrounding whitespace removed, lowercased
pub fn normalize_credential(value: &str) -> String {
    value.trim().to_lowercase()
}
