//! Calendar event notifications.
//!
//! This module turns upcoming calendar events into chat messages:
//!
//! - `matcher` - Handle and body extraction from an event description
//! - `dedup` - In-memory record of the events already notified
//! - `dispatcher` - Handle resolution and message delivery
//! - `poller` - The periodic loop tying everything together

mod dedup;
mod dispatcher;
mod matcher;
mod poller;

pub use crate::notifications::dispatcher::Dispatcher;
pub use crate::notifications::poller::{CalendarPoller, PollerSettings};
