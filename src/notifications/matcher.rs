//! Extraction of the target handle and the message body from an event description.
//!
//! By convention the first whitespace-delimited token of a description is the
//! handle of the person to notify, the rest is the text sent to them:
//!
//! ```text
//! alice Team sync at 3pm
//! ^^^^^ ^^^^^^^^^^^^^^^^
//! handle      body
//! ```

/// Returns the first whitespace-delimited token of `description`.
///
/// Returns an empty string for an empty or whitespace-only description.
pub fn match_handle(description: &str) -> &str {
    description.split_whitespace().next().unwrap_or_default()
}

/// Returns `description` without its first token and the single delimiter following it.
///
/// Returns an empty string when there is nothing after the first token.
pub fn match_body(description: &str) -> &str {
    let trimmed = description.trim_start();

    let Some(token_end) = trimmed.find(char::is_whitespace) else {
        return "";
    };

    let rest = &trimmed[token_end..];
    let delimiter_len = rest.chars().next().map(char::len_utf8).unwrap_or_default();
    &rest[delimiter_len..]
}

/// Composes the notification text: `<summary> - <body>`.
pub fn compose_text(summary: &str, body: &str) -> String {
    format!("{} - {}", summary, body)
}
