//! Calbot - A Telegram bot for Google Calendar event notifications.
//!
//! This is the main entry point for the Calbot bot, which bridges a Google Calendar
//! with Telegram chats to remind people of the events they are assigned to.
//!
//! # Overview
//!
//! Users register by sending `/start` to the bot. The bot stores their Telegram
//! username with their chat id. It then watches the upcoming events of a calendar:
//! when the description of an event starts with a registered username, the event is
//! sent to that user once.
//!
//! An event described as `alice Bring the slides` and titled `Standup` is delivered
//! to `@alice` as:
//!
//! ```text
//! Standup - Bring the slides
//! ```
//!
//! # Configuration
//!
//! Create a `config.yaml` file with your settings:
//!
//! ```yaml
//! telegram:
//!   bot_token: "123456:ABC-DEF"
//!
//! calendar:
//!   calendar_id: "primary"
//!   credentials: "credentials.json"
//!   polling_interval: 60
//! ```
//!
//! Override any configuration value using environment variables with the `CALBOT_` prefix:
//!
//! ```bash
//! export CALBOT_TELEGRAM__BOT_TOKEN="123456:ABC-DEF"
//! ```
//!
//! # Usage
//!
//! ```bash
//! calbot --config config.yaml --data ./calbot-data
//! ```
//!
//! On the first run, the bot prints a Google authorization url and waits for the
//! code to be pasted on stdin. The resulting token is cached in the data directory.
//!
//! # Architecture
//!
//! The bot consists of several modules:
//!
//! - [`bot`] - Start-up and the two concurrent loops
//! - [`calendar`] - Google Calendar client and OAuth token handling
//! - [`commands`] - `/start` registration
//! - [`config`] - YAML configuration with environment variable support
//! - [`identity`] - SQLite storage of the registered users
//! - [`notifications`] - Event matching, deduplication and delivery
//! - [`telegram`] - Telegram Bot API client and update stream
//! - [`utils`] - Utility functions for path handling
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bot::Bot, config::Config};

mod bot;
mod calendar;
mod commands;
mod config;
mod identity;
mod notifications;
mod telegram;
mod utils;

/// Command-line arguments for the Calbot bot.
///
/// # Examples
///
/// ```bash
/// calbot --config config.yaml --data ./calbot-data
/// ```
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    ///
    /// See the [`config`] module for the expected format.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Path to the directory for storing persistent data.
    ///
    /// This directory will contain:
    /// - `identities.db` - SQLite database of the registered users
    /// - `token.json` - OAuth token of the calendar account
    ///
    /// The token grants read access to the calendar, keep the directory private.
    #[arg(short, long, default_value = ".")]
    data: String,
}

/// Main entry point for the Calbot bot.
///
/// This function initializes the bot with the following steps:
///
/// 1. **Logging Setup**: Configures the logger with `info` level by default
/// 2. **Argument Parsing**: Parses command-line arguments using `clap`
/// 3. **Configuration Loading**: Reads the YAML configuration file and the
///    environment overrides
/// 4. **Bot Initialization**: Checks the bot token, opens the identity database and
///    authorizes the calendar access
/// 5. **Bot Execution**: Runs the registration listener and the calendar poller
///    until SIGINT or SIGTERM is received
///
/// Start-up failures are logged and end the process with a failure status.
#[tokio::main]
async fn main() -> ExitCode {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("starting calbot {}...", env!("CARGO_PKG_VERSION"));

    // Parse command line arguments
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load config file: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Launch bot
    let bot = match Bot::new(config, &args.data).await {
        Ok(b) => b,
        Err(e) => {
            error!("failed to initialize bot: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    bot.start(shutdown_signal()).await;

    info!("calbot stopped");
    ExitCode::SUCCESS
}

/// Completes on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for sigterm: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
