//! Registered chat identities.
//!
//! This module maps a Telegram username (the handle written at the start of a
//! calendar event description) to the numeric chat id the bot must send to.
//!
//! - [`Identity`]: A single registration captured from a `/start` command
//! - [`IdentityStore`]: Read/write contract used by the registration listener and the dispatcher
//! - [`SqliteIdentityStore`]: SQLite implementation persisted in the data directory
//!
//! # Example Usage
//!
//! ```no_run
//! use calbot::identity::{Identity, IdentityStore, SqliteIdentityStore};
//!
//! # async fn example() -> Result<(), calbot::identity::StoreError> {
//! let store = SqliteIdentityStore::open("identities.db").await?;
//!
//! store
//!     .register(&Identity {
//!         handle: "alice".to_string(),
//!         chat_id: 42,
//!         first_name: Some("Alice".to_string()),
//!         last_name: None,
//!     })
//!     .await?;
//!
//! assert_eq!(store.find_chat_id("alice").await?, Some(42));
//! # Ok(())
//! # }
//! ```

mod identity_store;
mod schema;

pub use crate::identity::identity_store::{IdentityStore, SqliteIdentityStore};

#[cfg(test)]
pub use crate::identity::identity_store::MockIdentityStore;

/// A chat registered through the `/start` command.
///
/// The handle is the unique key: registering the same handle again replaces
/// the stored chat id and names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Public Telegram username, without the leading `@`.
    pub handle: String,
    /// Telegram chat id used as the destination of notifications.
    pub chat_id: i64,
    /// First name of the chat, informational only.
    pub first_name: Option<String>,
    /// Last name of the chat, informational only.
    pub last_name: Option<String>,
}

/// Errors raised by an [`IdentityStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite connection or statement failed.
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}
