//! HTTP client for the Google Calendar v3 API.
//!
//! This module provides the [`GoogleCalendarRequester`] struct, which lists the
//! upcoming events of a calendar.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use mockall::automock;
use reqwest::{Client, Url};

use crate::calendar::{
    CalendarError, CalendarEvent, TokenProvider, response_structs::EventsResponse,
};

/// Read access to a calendar.
///
/// This trait abstracts the HTTP operations for easier testing with mocks.
#[automock]
pub trait CalendarSource {
    /// Lists up to `max_results` events overlapping `[time_min, time_max]`,
    /// ordered by start time.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// HTTP client for requesting the Google Calendar API.
///
/// # Examples
///
/// ```no_run
/// let requester = GoogleCalendarRequester::new("https://www.googleapis.com", authenticator, 30);
/// let events = requester.list_events("primary", now, now + Duration::hours(1), 5).await?;
/// ```
pub struct GoogleCalendarRequester<T: TokenProvider> {
    /// Calendar API base url, without trailing slash
    url: String,
    /// Source of the bearer token
    tokens: T,
    /// Timeout of a single request
    request_timeout: Duration,
    /// HTTP client
    client: Client,
}

impl<T: TokenProvider> GoogleCalendarRequester<T> {
    /// Create a new [GoogleCalendarRequester].
    ///
    /// # Arguments
    ///
    /// * `url` - The API base url, e.g. `https://www.googleapis.com`.
    /// * `tokens` - Provider of the OAuth access token.
    /// * `request_timeout` - Timeout of a single request, in seconds.
    pub fn new(url: &str, tokens: T, request_timeout: u64) -> Self {
        GoogleCalendarRequester {
            url: url.to_string(),
            tokens,
            request_timeout: Duration::from_secs(request_timeout),
            client: Client::new(),
        }
    }

    /// Url of the events collection of a calendar, with the id percent-encoded.
    fn events_url(&self, calendar_id: &str) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.url).map_err(|_| CalendarError::InvalidUrl(self.url.clone()))?;

        url.path_segments_mut()
            .map_err(|_| CalendarError::InvalidUrl(self.url.clone()))?
            .pop_if_empty()
            .extend(["calendar", "v3", "calendars", calendar_id, "events"]);

        Ok(url)
    }
}

impl<T: TokenProvider> CalendarSource for GoogleCalendarRequester<T> {
    /// Request `/calendar/v3/calendars/{calendarId}/events`.
    ///
    /// Recurring events are expanded into single instances and deleted events are
    /// left out, so every returned event has its own id.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = self.events_url(calendar_id)?;
        let access_token = self.tokens.access_token().await?;

        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = time_max.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = max_results.to_string();
        debug!(
            "request events of {} between {} and {}",
            calendar_id, time_min, time_max
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("showDeleted", "false"),
            ])
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events: EventsResponse = response.json().await?;
        debug!("received {} events", events.items.len());

        Ok(events.items.into_iter().map(CalendarEvent::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{AuthError, MockTokenProvider};
    use mockito::Matcher;

    fn create_test_token_provider() -> MockTokenProvider {
        let mut mock_tokens = MockTokenProvider::new();
        mock_tokens
            .expect_access_token()
            .returning(|| Ok("ya29.token".to_owned()));
        mock_tokens
    }

    fn create_test_window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            "2024-01-01T10:00:00Z".parse().unwrap(),
            "2024-01-01T11:00:00Z".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_events() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"items": [
            {"id": "e1", "summary": "Team sync", "description": "bob in 10 minutes"},
            {"id": "e2", "summary": "Lunch"}
        ]}"#;

        let mock = server
            .mock("GET", "/calendar/v3/calendars/primary/events")
            .match_header("authorization", "Bearer ya29.token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timeMin".to_owned(), "2024-01-01T10:00:00Z".to_owned()),
                Matcher::UrlEncoded("timeMax".to_owned(), "2024-01-01T11:00:00Z".to_owned()),
                Matcher::UrlEncoded("maxResults".to_owned(), "5".to_owned()),
                Matcher::UrlEncoded("singleEvents".to_owned(), "true".to_owned()),
                Matcher::UrlEncoded("orderBy".to_owned(), "startTime".to_owned()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let requester =
            GoogleCalendarRequester::new(&server.url(), create_test_token_provider(), 30);
        let (time_min, time_max) = create_test_window();
        let events = requester
            .list_events("primary", time_min, time_max, 5)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            CalendarEvent {
                id: "e1".to_owned(),
                summary: "Team sync".to_owned(),
                description: "bob in 10 minutes".to_owned(),
            }
        );
        assert_eq!(events[1].description, "");
    }

    #[tokio::test]
    async fn test_list_events_http_error() {
        let mut server = mockito::Server::new_async().await;

        server
            .mock("GET", "/calendar/v3/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#)
            .create_async()
            .await;

        let requester =
            GoogleCalendarRequester::new(&server.url(), create_test_token_provider(), 30);
        let (time_min, time_max) = create_test_window();
        let result = requester.list_events("primary", time_min, time_max, 5).await;

        assert!(matches!(
            result,
            Err(CalendarError::Status { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_events_auth_error() {
        let mut mock_tokens = MockTokenProvider::new();
        mock_tokens
            .expect_access_token()
            .returning(|| Err(AuthError::Expired));

        // The token is requested before any HTTP call
        let requester = GoogleCalendarRequester::new("http://127.0.0.1:9", mock_tokens, 30);
        let (time_min, time_max) = create_test_window();
        let result = requester.list_events("primary", time_min, time_max, 5).await;

        assert!(matches!(result, Err(CalendarError::Auth(AuthError::Expired))));
    }

    #[test]
    fn test_events_url_encodes_calendar_id() {
        let requester =
            GoogleCalendarRequester::new("https://www.googleapis.com", MockTokenProvider::new(), 30);

        assert_eq!(
            requester.events_url("primary").unwrap().as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/primary/events"
        );
        assert_eq!(
            requester.events_url("team/room#1").unwrap().as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%2Froom%231/events"
        );
    }

    #[test]
    fn test_events_url_invalid_base() {
        let requester = GoogleCalendarRequester::new("not a url", MockTokenProvider::new(), 30);

        assert!(matches!(
            requester.events_url("primary"),
            Err(CalendarError::InvalidUrl(_))
        ));
    }
}
