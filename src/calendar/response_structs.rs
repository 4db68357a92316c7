//! Response structures for the Google Calendar v3 API.

use serde::Deserialize;

use crate::calendar::CalendarEvent;

/// Page of events from `/calendar/v3/calendars/{calendarId}/events`.
///
/// `nextPageToken` is ignored: the request caps `maxResults` and the bot only
/// looks at the first page.
#[derive(Deserialize, Debug)]
pub struct EventsResponse {
    /// Events ordered by start time. Absent when the window is empty.
    #[serde(default)]
    pub items: Vec<EventItem>,
}

/// One event resource.
#[derive(Deserialize, Debug)]
pub struct EventItem {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
}

impl From<EventItem> for CalendarEvent {
    fn from(item: EventItem) -> Self {
        CalendarEvent {
            id: item.id,
            summary: item.summary,
            description: item.description,
        }
    }
}
