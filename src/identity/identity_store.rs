//! Persistence of registered identities.
//!
//! This module provides the [`IdentityStore`] contract and its SQLite
//! implementation, [`SqliteIdentityStore`].

use std::path::Path;

use log::{debug, info};
use mockall::automock;
use rusqlite::OptionalExtension as _;

use crate::identity::{Identity, StoreError, schema::SCHEMA};

/// Durable mapping from a handle to a chat id.
///
/// Written by the registration listener, read by the dispatcher. Implementations
/// are expected to serialize their own reads and writes.
#[automock]
pub trait IdentityStore {
    /// Inserts the identity, replacing any identity registered with the same handle.
    async fn register(&self, identity: &Identity) -> Result<(), StoreError>;
    /// Returns the chat id registered for `handle`, if any. Matching is case-insensitive.
    async fn find_chat_id(&self, handle: &str) -> Result<Option<i64>, StoreError>;
}

/// An [`IdentityStore`] backed by a single SQLite file.
///
/// Cloning is cheap, the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteIdentityStore {
    /// Opens (or creates) the database at `path` and creates the schema if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    /// Both are fatal at start-up.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        debug!("open identity database at {}", path.as_ref().display());
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = SqliteIdentityStore { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Opens a throwaway in-memory database.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = SqliteIdentityStore { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Number of registered identities.
    #[cfg(test)]
    async fn count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .call(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

impl IdentityStore for SqliteIdentityStore {
    async fn register(&self, identity: &Identity) -> Result<(), StoreError> {
        let identity = identity.clone();
        let handle = identity.handle.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO identities (handle, chat_id, first_name, last_name)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(handle) DO UPDATE SET
                        chat_id = excluded.chat_id,
                        first_name = excluded.first_name,
                        last_name = excluded.last_name",
                    rusqlite::params![
                        identity.handle,
                        identity.chat_id,
                        identity.first_name,
                        identity.last_name
                    ],
                )?;
                Ok(())
            })
            .await?;

        info!("registered identity {}", handle);
        Ok(())
    }

    async fn find_chat_id(&self, handle: &str) -> Result<Option<i64>, StoreError> {
        let handle = handle.to_owned();

        let chat_id = self
            .conn
            .call(move |conn| {
                let chat_id = conn
                    .query_row(
                        "SELECT chat_id FROM identities WHERE handle = ?1",
                        rusqlite::params![handle],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(chat_id)
            })
            .await?;

        Ok(chat_id)
    }
}
