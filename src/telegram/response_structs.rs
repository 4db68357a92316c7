//! Response structures for Telegram Bot API methods.
//!
//! Only the fields the bot reads are deserialized; everything else in the
//! payloads is ignored.

use serde::Deserialize;
use std::fmt;

use crate::telegram::TelegramError;

/// Envelope wrapping every Bot API response.
///
/// ```json
/// { "ok": true, "result": ... }
/// { "ok": false, "error_code": 401, "description": "Unauthorized" }
/// ```
#[derive(Deserialize, Debug)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Payload of a successful request.
    pub result: Option<T>,
    /// Human readable error on failure.
    pub description: Option<String>,
    /// HTTP-like error code on failure.
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// Converts the envelope into its payload or an [`TelegramError::Api`].
    pub fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                error_code: self.error_code,
                description: self
                    .description
                    .unwrap_or_else(|| "missing result".to_owned()),
            }),
        }
    }
}

/// Bot account returned by `getMe`.
#[derive(Deserialize, Debug, Clone)]
pub struct BotUser {
    /// Bot user id.
    pub id: i64,
    /// Bot username, without `@`.
    pub username: Option<String>,
    /// Bot display name.
    pub first_name: String,
}

/// One incoming update from `getUpdates`.
#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    /// Monotonic update identifier, used to acknowledge updates.
    pub update_id: i64,
    /// New incoming message, if the update is one.
    pub message: Option<Message>,
}

/// An incoming message.
#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    /// Conversation the message belongs to.
    pub chat: Chat,
    /// Text of the message, absent for media.
    pub text: Option<String>,
    /// Special entities in the text, such as bot commands.
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Returns `true` if the text starts with a bot command, e.g. `/start`.
    pub fn is_command(&self) -> bool {
        self.entities
            .iter()
            .any(|entity| entity.offset == 0 && entity.kind == "bot_command")
    }
}

/// A Telegram conversation.
#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    /// Chat id, the destination of `sendMessage`.
    pub id: i64,
    /// Public username, for private chats.
    pub username: Option<String>,
    /// First name of the other party, for private chats.
    pub first_name: Option<String>,
    /// Last name of the other party, for private chats.
    pub last_name: Option<String>,
}

/// A special entity in a message text.
#[derive(Deserialize, Debug, Clone)]
pub struct MessageEntity {
    /// Entity type, e.g. `bot_command`, `mention`, `url`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.message {
            Some(message) => write!(
                f,
                "update_id={}, chat_id={}, command={}",
                self.update_id,
                message.chat.id,
                message.is_command()
            ),
            None => write!(f, "update_id={}, no message", self.update_id),
        }
    }
}
