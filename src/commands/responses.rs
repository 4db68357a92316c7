//! Replies sent by the bot to registration commands.
//!
//! Telegram messages are sent as plain text, no formatting is applied.

/// Reply to a successful registration.
///
/// # Examples
///
/// ```
/// # use calbot::commands::responses::format_welcome;
/// assert!(format_welcome().starts_with("Welcome!"));
/// ```
pub fn format_welcome() -> String {
    "Welcome! Your information has been saved.".to_owned()
}

/// Reply when the registration could not be written.
pub fn format_registration_failed() -> String {
    "Sorry, your registration could not be saved. Please send /start again later.".to_owned()
}

/// Reply to a chat without a public username, which calendar events cannot refer to.
pub fn format_missing_username() -> String {
    "You need a Telegram username to receive notifications. \
     Set one in the Telegram settings, then send /start again."
        .to_owned()
}
