//! Long-polling of Telegram updates.
//!
//! This module provides the [`TelegramSync`] struct, which keeps track of the
//! update offset so that each update is received exactly once.

use std::sync::Arc;

use log::{debug, trace};

use crate::telegram::{InboundEvent, Messenger, TelegramError};

/// Stream of inbound events received through `getUpdates`.
///
/// Every call to [`TelegramSync::next_events`] acknowledges the updates of the
/// previous call by moving the offset past the highest received `update_id`.
pub struct TelegramSync<M: Messenger> {
    /// Client used to fetch updates
    messenger: Arc<M>,
    /// Identifier of the first update to request
    offset: i64,
    /// Long-poll duration in seconds
    poll_timeout: u64,
    /// Username of the bot, to tell apart commands addressed to other bots
    bot_username: Option<String>,
}

impl<M: Messenger> TelegramSync<M> {
    /// Create a new [TelegramSync] starting at the oldest unacknowledged update.
    ///
    /// # Arguments
    ///
    /// * `messenger` - The Bot API client.
    /// * `poll_timeout` - How long the server may hold a `getUpdates` request, in seconds.
    /// * `bot_username` - Username returned by `getMe`, without `@`.
    pub fn new(messenger: Arc<M>, poll_timeout: u64, bot_username: Option<String>) -> Self {
        TelegramSync {
            messenger,
            offset: 0,
            poll_timeout,
            bot_username,
        }
    }

    /// Waits for the next batch of updates and converts them into events.
    ///
    /// Updates without a message are acknowledged and dropped. On error the offset
    /// is left untouched so the same updates are requested again.
    pub async fn next_events(&mut self) -> Result<Vec<InboundEvent>, TelegramError> {
        let updates = self
            .messenger
            .get_updates(self.offset, self.poll_timeout)
            .await?;

        if let Some(last_id) = updates.iter().map(|update| update.update_id).max() {
            self.offset = self.offset.max(last_id + 1);
            debug!("update offset moved to {}", self.offset);
        }

        Ok(updates
            .into_iter()
            .inspect(|update| trace!("received update {}", update))
            .filter_map(|update| InboundEvent::from_update(update, self.bot_username.as_deref()))
            .collect())
    }
}
