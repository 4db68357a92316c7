//! HTTP client for the Telegram Bot API.
//!
//! This module provides the [`TelegramRequester`] struct for calling the Bot API
//! methods the bot relies on.

use std::time::Duration;

use log::{debug, trace};
use mockall::automock;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::telegram::{
    TelegramError,
    response_structs::{ApiResponse, BotUser, Message, Update},
};

/// Extra time granted to a long-poll request on top of its server-side timeout.
const LONG_POLL_MARGIN_SECS: u64 = 10;

/// Timeout of the short Bot API calls (`getMe`, `sendMessage`).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Operations the bot needs from the messaging platform.
///
/// This trait abstracts the HTTP operations for easier testing with mocks.
#[automock]
pub trait Messenger {
    /// Returns the bot account. Fails when the bot token is invalid.
    async fn get_me(&self) -> Result<BotUser, TelegramError>;
    /// Long-polls for updates with an id greater or equal to `offset`.
    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TelegramError>;
    /// Sends a plain text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

/// HTTP client for requesting the Telegram Bot API.
///
/// # Examples
///
/// ```no_run
/// let requester = TelegramRequester::new("https://api.telegram.org", "123456:bot-token");
/// requester.send_message(42, "Team sync - in 10 minutes").await?;
/// ```
pub struct TelegramRequester {
    /// Bot API base url, without trailing slash
    url: String,
    /// Secret bot token issued by @BotFather
    bot_token: String,
    /// HTTP client
    client: Client,
}

impl TelegramRequester {
    /// Create a new [TelegramRequester].
    ///
    /// # Arguments
    ///
    /// * `url` - The Bot API base url, e.g. `https://api.telegram.org`.
    /// * `bot_token` - The token of the bot account.
    pub fn new(url: &str, bot_token: &str) -> Self {
        TelegramRequester {
            url: url.to_string(),
            bot_token: bot_token.to_string(),
            client: Client::new(),
        }
    }

    /// Url of a Bot API method. Contains the token, never log it.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.url, self.bot_token, method)
    }

    /// Sends the request and unwraps the Bot API envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, TelegramError> {
        trace!("request telegram method {}", method);

        // Bot API errors come with a 4xx status and a JSON envelope, so the status is not checked
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(redact_url)?
            .json()
            .await
            .map_err(redact_url)?;
        response.into_result()
    }
}

/// Drops the request url, which embeds the bot token, from a transport error.
fn redact_url(err: reqwest::Error) -> TelegramError {
    TelegramError::Http(err.without_url())
}

impl Messenger for TelegramRequester {
    /// Request `getMe` to check the token and get the bot account.
    async fn get_me(&self) -> Result<BotUser, TelegramError> {
        let request = self
            .client
            .get(self.method_url("getMe"))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

        let bot_user: BotUser = self.call("getMe", request).await?;
        debug!("bot account {:?}", bot_user);

        Ok(bot_user)
    }

    /// Request `getUpdates?offset={offset}&timeout={timeout}`.
    ///
    /// The server holds the request up to `timeout` seconds when no update is
    /// pending. Only `message` updates are requested.
    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TelegramError> {
        let request = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .timeout(Duration::from_secs(timeout + LONG_POLL_MARGIN_SECS));

        let updates: Vec<Update> = self.call("getUpdates", request).await?;
        if !updates.is_empty() {
            debug!("received {} updates from offset {}", updates.len(), offset);
        }

        Ok(updates)
    }

    /// Request `sendMessage` with a JSON body `{ chat_id, text }`.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let request = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

        let _message: Message = self.call("sendMessage", request).await?;
        debug!("message sent to chat {}", chat_id);

        Ok(())
    }
}
