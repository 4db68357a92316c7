//! Registration of chat identities.
//!
//! This module provides the [`RegistrationListener`], which consumes the inbound
//! Telegram events in order and stores the identity of every chat sending `/start`.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{
        command::Command,
        responses::{format_missing_username, format_registration_failed, format_welcome},
    },
    identity::{Identity, IdentityStore},
    telegram::{ChatInfo, InboundEvent, Messenger, TelegramSync},
};

/// Pause after a failed `getUpdates` before asking again.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Listens for `/start` commands and writes the sender's identity to the store.
///
/// The reply depends on the outcome of the write: the welcome message is only
/// sent once the identity is stored.
pub struct RegistrationListener<M: Messenger, S: IdentityStore> {
    /// Client used to reply, shared with the dispatcher
    messenger: Arc<M>,
    /// Registered identities, shared with the dispatcher
    store: Arc<S>,
}

impl<M: Messenger, S: IdentityStore> RegistrationListener<M, S> {
    /// Create a new [RegistrationListener].
    pub fn new(messenger: Arc<M>, store: Arc<S>) -> Self {
        RegistrationListener { messenger, store }
    }

    /// Processes inbound events until `cancel` is triggered.
    ///
    /// Events are handled one at a time in delivery order. A failed receive is
    /// logged and retried after a short pause.
    pub async fn run(self, mut sync: TelegramSync<M>, cancel: CancellationToken) {
        info!("listening for registrations");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = sync.next_events() => result,
            };

            match result {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event).await;
                    }
                }
                Err(err) => {
                    error!("failed to receive telegram updates: {}", err);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("registration listener stopped");
    }

    /// Handles one inbound event. Everything but `/start` is ignored.
    pub async fn handle_event(&self, event: InboundEvent) {
        let InboundEvent::Command { name, chat } = event else {
            return;
        };

        match Command::parse(&name) {
            Ok(Command::Start) => self.register(chat).await,
            Err(_) => debug!("ignore command /{} from chat {}", name, chat.id),
        }
    }

    /// Stores the identity of `chat`, then replies with the outcome.
    async fn register(&self, chat: ChatInfo) {
        let reply = match chat.username {
            Some(handle) if !handle.is_empty() => {
                let identity = Identity {
                    handle,
                    chat_id: chat.id,
                    first_name: chat.first_name,
                    last_name: chat.last_name,
                };

                match self.store.register(&identity).await {
                    Ok(()) => format_welcome(),
                    Err(err) => {
                        error!("failed to register chat {}: {}", chat.id, err);
                        format_registration_failed()
                    }
                }
            }
            _ => {
                warn!("chat {} has no username, not registered", chat.id);
                format_missing_username()
            }
        };

        if let Err(err) = self.messenger.send_message(chat.id, &reply).await {
            error!("failed to reply to chat {}: {}", chat.id, err);
        }
    }
}
