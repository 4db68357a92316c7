//! Delivery of notifications to registered identities.

use std::sync::Arc;

use log::{error, info, warn};

use crate::{
    identity::IdentityStore,
    telegram::{Messenger, TelegramError},
};

/// Resolves handles through the identity store and sends the notifications.
pub struct Dispatcher<M: Messenger, S: IdentityStore> {
    /// Client used to send the notifications
    messenger: Arc<M>,
    /// Registered identities
    store: Arc<S>,
}

impl<M: Messenger, S: IdentityStore> Dispatcher<M, S> {
    /// Create a new [Dispatcher].
    ///
    /// # Arguments
    ///
    /// * `messenger` - Client used to send the notifications, shared with the registration listener.
    /// * `store` - Identity store, shared with the registration listener.
    pub fn new(messenger: Arc<M>, store: Arc<S>) -> Self {
        Dispatcher { messenger, store }
    }

    /// Returns the chat id registered for `handle`.
    ///
    /// A leading `@` is ignored. A handle that is not registered, or a failed
    /// lookup, is logged once and gives `None`.
    pub async fn resolve(&self, handle: &str) -> Option<i64> {
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        if handle.is_empty() {
            warn!("skip notification, empty handle");
            return None;
        }

        match self.store.find_chat_id(handle).await {
            Ok(Some(chat_id)) => Some(chat_id),
            Ok(None) => {
                warn!("skip notification, handle {} is not registered", handle);
                None
            }
            Err(err) => {
                error!("skip notification, lookup of handle {} failed: {}", handle, err);
                None
            }
        }
    }

    /// Sends `text` to `chat_id`. A failure is logged and returned.
    pub async fn send(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        match self.messenger.send_message(chat_id, text).await {
            Ok(()) => {
                info!("notification sent to chat {}", chat_id);
                Ok(())
            }
            Err(err) => {
                error!("failed to send notification to chat {}: {}", chat_id, err);
                Err(err)
            }
        }
    }
}
