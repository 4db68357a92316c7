//! Telegram Bot API integration.
//!
//! This module provides the messaging side of the bot:
//!
//! - `requester` - HTTP client for the Bot API methods used by the bot (`getMe`, `getUpdates`, `sendMessage`)
//! - `response_structs` - Deserialized Bot API payloads
//! - `sync` - Long-polling update stream turning raw updates into [`InboundEvent`]s
//!
//! # Examples
//!
//! ```no_run
//! use calbot::telegram::{Messenger, TelegramRequester};
//!
//! # async fn example() -> Result<(), calbot::telegram::TelegramError> {
//! let requester = TelegramRequester::new("https://api.telegram.org", "123456:bot-token");
//! let me = requester.get_me().await?;
//! requester.send_message(42, "hello").await?;
//! # Ok(())
//! # }
//! ```

mod requester;
mod response_structs;
mod sync;

use log::trace;

pub use crate::telegram::requester::{Messenger, TelegramRequester};
pub use crate::telegram::response_structs::{BotUser, Update};
pub use crate::telegram::sync::TelegramSync;

#[cfg(test)]
pub use crate::telegram::requester::MockMessenger;
#[cfg(test)]
pub use crate::telegram::response_structs::{Chat, Message, MessageEntity};

/// Errors returned by the Telegram Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Network failure, timeout or undecodable response body. The url is stripped
    /// as it carries the bot token.
    #[error("telegram request failed: {0}")]
    Http(reqwest::Error),
    /// The Bot API answered with `ok: false`.
    #[error("telegram api error {error_code:?}: {description}")]
    Api {
        /// Error code reported by the Bot API, e.g. 401 for a bad token.
        error_code: Option<i64>,
        /// Error description reported by the Bot API.
        description: String,
    },
}

/// Metadata of the chat an inbound event comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatInfo {
    /// Telegram chat id.
    pub id: i64,
    /// Public username, if the chat has one.
    pub username: Option<String>,
    /// First name, if known.
    pub first_name: Option<String>,
    /// Last name, if known.
    pub last_name: Option<String>,
}

/// An incoming message, tagged as a bot command or plain text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message starting with a bot command such as `/start`.
    Command {
        /// Command name without the leading `/` nor the `@botname` suffix.
        name: String,
        /// Chat the command was sent from.
        chat: ChatInfo,
    },
    /// Any other message.
    Message {
        /// Chat the message was sent from.
        chat: ChatInfo,
    },
}

impl InboundEvent {
    /// Builds an event from a raw update.
    ///
    /// A command addressed to another bot, such as `/start@other_bot` in a group,
    /// is reported as a plain message. Without `bot_username` every command is
    /// accepted.
    ///
    /// Returns `None` for updates that carry no message (edits, callbacks, ...).
    pub fn from_update(update: Update, bot_username: Option<&str>) -> Option<Self> {
        let message = update.message?;
        let is_command = message.is_command();

        let chat = ChatInfo {
            id: message.chat.id,
            username: message.chat.username,
            first_name: message.chat.first_name,
            last_name: message.chat.last_name,
        };

        let Some(text) = message.text.filter(|_| is_command) else {
            return Some(InboundEvent::Message { chat });
        };

        let (name, addressee) = parse_command(&text);
        match (addressee, bot_username) {
            (Some(addressee), Some(bot_username))
                if !addressee.eq_ignore_ascii_case(bot_username) =>
            {
                trace!("ignore command /{} addressed to @{}", name, addressee);
                Some(InboundEvent::Message { chat })
            }
            _ => Some(InboundEvent::Command {
                name: name.to_owned(),
                chat,
            }),
        }
    }
}

/// Splits `/start@calbot payload` into `start` and the addressed bot `calbot`.
fn parse_command(text: &str) -> (&str, Option<&str>) {
    let token = text.split_whitespace().next().unwrap_or_default();
    let token = token.strip_prefix('/').unwrap_or(token);

    match token.split_once('@') {
        Some((name, bot)) => (name, Some(bot)),
        None => (token, None),
    }
}
