//! Account field rules shared by registration forms and the JSON API.

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;

/// Usernames are lowercase ASCII letters, digits and underscores.
pub fn is_valid_username(value: &str) -> bool {
    let len = value.chars().count();
    (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len)
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Emails are compared case-insensitively.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
