//! Configuration file structures for the calbot bot.
//!
//! This module defines the configuration file format using YAML. The configuration
//! is split into two sections: Telegram bot settings and Google Calendar settings.
//!
//! # Configuration File Format
//!
//! ```yaml
//! # Telegram Bot Configuration
//! telegram:
//!   # Token issued by @BotFather
//!   bot_token: "123456:ABC-DEF"
//!   # Bot API base url
//!   api_url: "https://api.telegram.org"
//!   # Long-poll duration of getUpdates, in seconds
//!   poll_timeout: 60
//!
//! # Google Calendar Configuration
//! calendar:
//!   # Calendar to watch, "primary" is the main calendar of the account
//!   calendar_id: "primary"
//!   # OAuth client secret downloaded from the Google Cloud console
//!   credentials: "credentials.json"
//!   # Calendar API base url
//!   api_url: "https://www.googleapis.com"
//!   # Seconds between two polls
//!   polling_interval: 60
//!   # Look-ahead window, in seconds
//!   window: 3600
//!   # Maximum number of events per poll
//!   max_results: 5
//!   # Timeout of a calendar request, in seconds
//!   request_timeout: 30
//! ```
//!
//! Only `telegram.bot_token` is required.
//!
//! # Environment Variable Overrides
//!
//! Any value can be overridden with a `CALBOT_` prefixed variable, sections being
//! separated by a double underscore:
//!
//! ```bash
//! export CALBOT_TELEGRAM__BOT_TOKEN="123456:ABC-DEF"
//! export CALBOT_CALENDAR__CALENDAR_ID="team@group.calendar.google.com"
//! ```

use std::path::Path;

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "CALBOT_";

/// Longest accepted look-ahead window, one year.
const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Root configuration structure for the calbot bot.
#[derive(Deserialize)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: Telegram,
    /// Google Calendar configuration
    #[serde(default)]
    pub calendar: Calendar,
}

/// Telegram bot configuration.
///
/// # YAML Section
///
/// ```yaml
/// telegram:
///   bot_token: "123456:ABC-DEF"
/// ```
#[derive(Deserialize)]
pub struct Telegram {
    /// Secret token of the bot account, never logged.
    pub bot_token: String,

    /// Base URL of the Bot API, without trailing slash.
    #[serde(default = "default_telegram_url")]
    pub api_url: String,

    /// How long a `getUpdates` request may be held by the server, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
}

/// Google Calendar configuration.
///
/// # YAML Section
///
/// ```yaml
/// calendar:
///   calendar_id: "primary"
///   credentials: "credentials.json"
///   polling_interval: 60
/// ```
#[derive(Deserialize)]
#[serde(default)]
pub struct Calendar {
    /// Identifier of the watched calendar.
    pub calendar_id: String,

    /// Path of the OAuth client secret file.
    pub credentials: String,

    /// Base URL of the Calendar API, without trailing slash.
    pub api_url: String,

    /// Polling interval in seconds.
    ///
    /// How frequently the bot looks for upcoming events.
    pub polling_interval: u64,

    /// Length of the look-ahead window in seconds.
    ///
    /// Events starting within `[now, now + window]` are notified.
    pub window: u64,

    /// Maximum number of events requested per poll.
    pub max_results: u32,

    /// Timeout of a single calendar request in seconds.
    pub request_timeout: u64,
}

impl Default for Calendar {
    fn default() -> Self {
        Calendar {
            calendar_id: "primary".to_owned(),
            credentials: "credentials.json".to_owned(),
            api_url: "https://www.googleapis.com".to_owned(),
            polling_interval: 60,
            window: 3600,
            max_results: 5,
            request_timeout: 30,
        }
    }
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_owned()
}

fn default_poll_timeout() -> u64 {
    60
}

impl Config {
    /// Loads the configuration from a YAML file, then applies the `CALBOT_`
    /// environment overrides.
    ///
    /// Trailing slashes are removed from the urls.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, if `telegram.bot_token` is
    /// missing or empty, if a polling value or the request timeout is zero, or if
    /// the window exceeds one year.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use calbot::config::Config;
    /// let config = Config::load("config.yaml")?;
    /// println!("watching {}", config.calendar.calendar_id);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();

        let mut config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("invalid configuration {}", path.display()))?;

        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn normalize(&mut self) {
        trim_trailing_slashes(&mut self.telegram.api_url);
        trim_trailing_slashes(&mut self.calendar.api_url);
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.telegram.bot_token.trim().is_empty(),
            "telegram.bot_token must not be empty"
        );
        ensure!(
            self.calendar.polling_interval > 0,
            "calendar.polling_interval must be positive"
        );
        ensure!(self.calendar.window > 0, "calendar.window must be positive");
        ensure!(
            self.calendar.window <= MAX_WINDOW_SECS,
            "calendar.window must not exceed {} seconds",
            MAX_WINDOW_SECS
        );
        ensure!(
            self.calendar.max_results > 0,
            "calendar.max_results must be positive"
        );
        ensure!(
            self.calendar.request_timeout > 0,
            "calendar.request_timeout must be positive"
        );
        Ok(())
    }
}

fn trim_trailing_slashes(url: &mut String) {
    while url.ends_with('/') {
        url.pop();
    }
}
