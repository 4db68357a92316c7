//! Bot command handling.
//!
//! This module provides the registration side of the bot: Telegram users send
//! `/start` to the bot, which stores their username and chat id so that calendar
//! events mentioning the username can be delivered to them.
//!
//! # Overview
//!
//! ```text
//! getUpdates ─► TelegramSync ─► InboundEvent ─► RegistrationListener
//!                                                 │
//!                                                 ├─ Command::parse
//!                                                 ├─ IdentityStore::register
//!                                                 └─ reply (welcome or failure)
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `/start` | Register the sender's chat for notifications |
//!
//! Any other command and plain messages are ignored.
//!
//! # Module Organization
//!
//! - [`command`] - Command enum and parsing
//! - [`registration`] - The listener loop
//! - [`responses`] - Reply texts

pub mod command;
mod registration;
pub mod responses;

pub use crate::commands::registration::RegistrationListener;
