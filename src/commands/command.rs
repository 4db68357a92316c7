//! Command parsing.
//!
//! This module converts the name of a Telegram bot command into a structured
//! [`Command`] that can be processed by the registration listener.

use log::debug;

/// Represents a parsed bot command.
#[derive(Debug, Hash, PartialEq, Eq)]
pub enum Command {
    /// Register the sender's chat so that it can receive notifications
    Start,
}

/// Errors that can occur during command parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandParsingError {
    /// The command is not recognized
    Unknown,
}

impl Command {
    /// Parses a command name, without the leading `/`, into a Command.
    ///
    /// Matching is case-insensitive, as Telegram clients send commands the way
    /// the user typed them.
    ///
    /// # Errors
    ///
    /// Returns [`CommandParsingError::Unknown`] for any command other than `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use calbot::commands::command::Command;
    /// assert_eq!(Command::parse("start"), Ok(Command::Start));
    /// ```
    pub fn parse(name: &str) -> Result<Self, CommandParsingError> {
        debug!("parsing command: {}", name);

        match name.to_lowercase().as_str() {
            "start" => Ok(Command::Start),
            _ => Err(CommandParsingError::Unknown),
        }
    }
}
