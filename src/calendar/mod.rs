//! Google Calendar integration.
//!
//! This module provides read access to upcoming calendar events:
//!
//! - `auth` - OAuth 2.0 credentials, cached token and refresh
//! - `requester` - HTTP client for the Calendar v3 events endpoint
//! - `response_structs` - Deserialized Calendar API payloads
//!
//! # Examples
//!
//! ```no_run
//! use calbot::calendar::{Authenticator, CalendarSource, GoogleCalendarRequester};
//! use chrono::{Duration, Utc};
//!
//! # async fn example() -> Result<(), calbot::calendar::CalendarError> {
//! let input = tokio::io::BufReader::new(tokio::io::stdin());
//! let timeout = std::time::Duration::from_secs(30);
//! let authenticator =
//!     Authenticator::bootstrap("credentials.json", "token.json", timeout, input).await?;
//! let requester = GoogleCalendarRequester::new("https://www.googleapis.com", authenticator, 30);
//!
//! let now = Utc::now();
//! let events = requester.list_events("primary", now, now + Duration::hours(1), 5).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod requester;
mod response_structs;

pub use crate::calendar::auth::{AuthError, Authenticator, TokenProvider};
pub use crate::calendar::requester::{CalendarSource, GoogleCalendarRequester};

#[cfg(test)]
pub use crate::calendar::auth::MockTokenProvider;
#[cfg(test)]
pub use crate::calendar::requester::MockCalendarSource;

use std::fmt;

/// Errors returned by the calendar client.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Network failure, timeout or undecodable response body.
    #[error("calendar request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The access token could not be obtained.
    #[error("calendar authorization failed: {0}")]
    Auth(#[from] AuthError),
    /// The Calendar API answered with a non-success status.
    #[error("calendar api returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The configured API url cannot be used as a base url.
    #[error("invalid calendar api url {0}")]
    InvalidUrl(String),
    /// The end of the query window is out of the representable time range.
    #[error("query window of {0} seconds is out of range")]
    InvalidWindow(u64),
}

/// An upcoming calendar event, as seen by the notifier.
///
/// Missing `summary` or `description` are represented by empty strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Identifier assigned by the calendar, unique within it.
    pub id: String,
    /// Event title.
    pub summary: String,
    /// Free text; starts with the handle of the person to notify.
    pub description: String,
}

impl fmt::Display for CalendarEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "id={}, summary={}", self.id, self.summary)
    }
}
