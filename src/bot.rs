//! Bot module wiring Telegram and Google Calendar together.
//!
//! This module provides the main [`Bot`] implementation. It builds every
//! collaborator at start-up and runs the two long-lived loops of the bot.
//!
//! # Architecture
//!
//! The bot operates with two concurrent tasks:
//!
//! 1. **Registration Listener**: Long-polls Telegram for `/start` commands and stores
//!    the username and chat id of the sender.
//!
//! 2. **Calendar Poller**: Lists the upcoming events every `polling_interval` seconds,
//!    reads the username at the start of each description and sends the event to the
//!    matching chat, once per event.
//!
//! Both tasks share the Telegram client and the identity store. They stop together
//! when the shutdown future completes.
//!
//! # Example
//!
//! ```no_run
//! # use calbot::bot::Bot;
//! # use calbot::config::Config;
//! # async fn run() -> Result<(), anyhow::Error> {
//! let config = Config::load("config.yaml")?;
//!
//! let bot = Bot::new(config, ".").await?;
//! bot.start(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await;
//! # Ok(())
//! # }
//! ```

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Context;
use futures::future::join_all;
use log::{info, warn};
use tokio::{io::BufReader, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    calendar::{Authenticator, GoogleCalendarRequester},
    commands::RegistrationListener,
    config::Config,
    identity::SqliteIdentityStore,
    notifications::{CalendarPoller, Dispatcher, PollerSettings},
    telegram::{Messenger, TelegramRequester, TelegramSync},
    utils::get_path,
};

/// Time left to the loops to finish once shutdown is requested.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Main bot structure that integrates Telegram messaging with Google Calendar.
pub struct Bot {
    /// Telegram client, shared by both loops.
    ///
    /// Used to receive the registration commands, reply to them and send the
    /// notifications.
    telegram: Arc<TelegramRequester>,

    /// Long-poll duration of `getUpdates`, in seconds.
    poll_timeout: u64,

    /// Username of the bot account, as returned by `getMe`.
    bot_username: Option<String>,

    /// Registered identities, shared by both loops.
    ///
    /// Written by the registration listener and read by the calendar poller.
    identity_store: Arc<SqliteIdentityStore>,

    /// Calendar client authenticated with the cached OAuth token.
    calendar: GoogleCalendarRequester<Authenticator>,

    /// Polling parameters of the calendar poller.
    poller_settings: PollerSettings,
}

impl Bot {
    /// Creates a new Bot instance from configuration.
    ///
    /// This constructor checks the bot token, opens the identity database and
    /// loads the calendar credentials. When no calendar token is cached yet, the
    /// authorization url is printed and the code is read from stdin.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration loaded from the YAML file.
    /// * `data_path` - Directory holding `identities.db` and `token.json`.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The bot token is rejected by Telegram
    /// - The identity database cannot be opened or its schema created
    /// - The client secret file is unreadable or the authorization fails
    pub async fn new(config: Config, data_path: &str) -> Result<Self, anyhow::Error> {
        // Check the bot token
        let telegram = Arc::new(TelegramRequester::new(
            &config.telegram.api_url,
            &config.telegram.bot_token,
        ));
        let bot_user = telegram
            .get_me()
            .await
            .context("failed to authenticate with telegram")?;
        info!(
            "logged in telegram as @{}",
            bot_user.username.as_deref().unwrap_or(&bot_user.first_name)
        );

        // Open identity database
        let identity_store = Arc::new(
            SqliteIdentityStore::open(get_path(data_path, "identities.db"))
                .await
                .context("failed to open identity database")?,
        );

        // Load calendar credentials
        let authenticator = Authenticator::bootstrap(
            &config.calendar.credentials,
            get_path(data_path, "token.json"),
            Duration::from_secs(config.calendar.request_timeout),
            BufReader::new(tokio::io::stdin()),
        )
        .await
        .context("failed to authorize calendar access")?;
        let calendar = GoogleCalendarRequester::new(
            &config.calendar.api_url,
            authenticator,
            config.calendar.request_timeout,
        );

        Ok(Bot {
            telegram,
            poll_timeout: config.telegram.poll_timeout,
            bot_username: bot_user.username,
            identity_store,
            calendar,
            poller_settings: PollerSettings {
                calendar_id: config.calendar.calendar_id,
                window: config.calendar.window,
                max_results: config.calendar.max_results,
                polling_interval: config.calendar.polling_interval,
            },
        })
    }

    /// Starts both loops and runs until `shutdown` completes.
    ///
    /// Once `shutdown` completes, the loops are cancelled and given a grace period
    /// of 5 seconds to finish. Loops still running after that are abandoned.
    pub async fn start(self, shutdown: impl Future<Output = ()>) {
        let cancel = CancellationToken::new();

        let sync = TelegramSync::new(
            Arc::clone(&self.telegram),
            self.poll_timeout,
            self.bot_username,
        );
        let listener =
            RegistrationListener::new(Arc::clone(&self.telegram), Arc::clone(&self.identity_store));

        let dispatcher = Dispatcher::new(self.telegram, self.identity_store);
        let poller = CalendarPoller::new(self.calendar, dispatcher, self.poller_settings);

        let handles = vec![
            tokio::spawn(listener.run(sync, cancel.clone())),
            tokio::spawn(poller.run(cancel.clone())),
        ];

        shutdown.await;
        info!("shutdown requested");
        cancel.cancel();

        match timeout(SHUTDOWN_GRACE_PERIOD, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(err) = result {
                        warn!("task ended abnormally: {}", err);
                    }
                }
                info!("all tasks stopped");
            }
            Err(_) => warn!(
                "tasks still running after {} seconds, exiting anyway",
                SHUTDOWN_GRACE_PERIOD.as_secs()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Calendar, Telegram};
    use tempfile::TempDir;

    fn create_test_config(telegram_url: &str, credentials: &str) -> Config {
        Config {
            telegram: Telegram {
                bot_token: "123:abc".to_owned(),
                api_url: telegram_url.to_owned(),
                poll_timeout: 0,
            },
            calendar: Calendar {
                credentials: credentials.to_owned(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_token() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();

        server
            .mock("GET", "/bot123:abc/getMe")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#)
            .create_async()
            .await;

        let config = create_test_config(&server.url(), "credentials.json");
        let result = Bot::new(config, dir.path().to_str().unwrap()).await;

        assert!(result.is_err());
        // Nothing is created before the token is validated
        assert!(!dir.path().join("identities.db").exists());
    }

    #[tokio::test]
    async fn test_new_fails_without_credentials() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();

        server
            .mock("GET", "/bot123:abc/getMe")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true, "result": {"id": 1, "is_bot": true, "first_name": "Calbot", "username": "calbot"}}"#)
            .create_async()
            .await;

        let credentials = dir.path().join("missing-credentials.json");
        let config = create_test_config(&server.url(), credentials.to_str().unwrap());
        let result = Bot::new(config, dir.path().to_str().unwrap()).await;

        let err = result.err().unwrap();
        assert!(format!("{:#}", err).contains("missing-credentials.json"));
    }
}
