//! Periodic polling of the calendar and dispatch of the notifications.
//!
//! This module provides the [`CalendarPoller`], the owner of the notification
//! loop. Each cycle:
//!
//! 1. Lists the events starting within `[now, now + window]`
//! 2. Skips the events already notified
//! 3. Extracts the handle from the description and resolves it to a chat id
//! 4. Sends `<summary> - <body>` and marks the event as notified

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    calendar::{CalendarError, CalendarEvent, CalendarSource},
    identity::IdentityStore,
    notifications::{
        Dispatcher,
        dedup::NotificationDeduplicator,
        matcher::{compose_text, match_body, match_handle},
    },
    telegram::Messenger,
};

/// Polling parameters, see the `calendar` section of the configuration.
#[derive(Clone, Debug)]
pub struct PollerSettings {
    /// Calendar to read, `primary` for the account's main calendar
    pub calendar_id: String,
    /// Length of the look-ahead window, in seconds
    pub window: u64,
    /// Maximum number of events requested per cycle
    pub max_results: u32,
    /// Pause between two cycles, in seconds
    pub polling_interval: u64,
}

/// What happened to one event during a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// A notification was already attempted in a previous cycle.
    AlreadyNotified,
    /// The description carries no handle.
    Unmatched,
    /// The handle is not registered, or could not be looked up.
    Unresolved,
    Sent,
    SendFailed,
}

/// Counters of one cycle, logged when the cycle ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub already_notified: usize,
    pub unmatched: usize,
    pub unresolved: usize,
    pub sent: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::AlreadyNotified => self.already_notified += 1,
            EventOutcome::Unmatched => self.unmatched += 1,
            EventOutcome::Unresolved => self.unresolved += 1,
            EventOutcome::Sent => self.sent += 1,
            EventOutcome::SendFailed => self.failed += 1,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "fetched={}, already_notified={}, unmatched={}, unresolved={}, sent={}, failed={}",
            self.fetched,
            self.already_notified,
            self.unmatched,
            self.unresolved,
            self.sent,
            self.failed
        )
    }
}

/// Notification loop over the upcoming calendar events.
///
/// The poller exclusively owns the [`NotificationDeduplicator`], cycles never
/// overlap.
pub struct CalendarPoller<C: CalendarSource, M: Messenger, S: IdentityStore> {
    /// Source of the events
    calendar: C,
    /// Handle resolution and delivery
    dispatcher: Dispatcher<M, S>,
    /// Events already notified
    dedup: NotificationDeduplicator,
    settings: PollerSettings,
}

impl<C: CalendarSource, M: Messenger, S: IdentityStore> CalendarPoller<C, M, S> {
    /// Create a new [CalendarPoller] with an empty deduplication set.
    pub fn new(calendar: C, dispatcher: Dispatcher<M, S>, settings: PollerSettings) -> Self {
        CalendarPoller {
            calendar,
            dispatcher,
            dedup: NotificationDeduplicator::new(),
            settings,
        }
    }

    /// Runs cycles until `cancel` is triggered.
    ///
    /// The first cycle starts immediately, then the poller sleeps
    /// `polling_interval` seconds after the end of each cycle. A failed query is
    /// logged and the cycle is skipped. Cancellation interrupts a cycle in progress.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "polling calendar {} every {} seconds",
            self.settings.calendar_id, self.settings.polling_interval
        );
        let interval = std::time::Duration::from_secs(self.settings.polling_interval);

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle(Utc::now()) => result,
            };

            match result {
                Ok(report) => info!("calendar cycle done: {}", report),
                Err(err) => error!("failed to query calendar, skip cycle: {}", err),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }

        info!("calendar poller stopped");
    }

    /// Queries the window starting at `now` and processes the returned events in order.
    ///
    /// # Errors
    ///
    /// Returns the query error, or [`CalendarError::InvalidWindow`] when `now + window`
    /// cannot be represented. No event is processed in that case.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, CalendarError> {
        let window = self.settings.window;
        let time_max = i64::try_from(window)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or(CalendarError::InvalidWindow(window))?;

        let events = self
            .calendar
            .list_events(
                &self.settings.calendar_id,
                now,
                time_max,
                self.settings.max_results,
            )
            .await?;

        let mut report = CycleReport {
            fetched: events.len(),
            ..Default::default()
        };

        for event in &events {
            let outcome = self.process_event(event).await;
            debug!("event {} -> {:?}", event, outcome);
            report.record(outcome);
        }

        Ok(report)
    }

    /// Runs one event through matcher, deduplicator and dispatcher.
    ///
    /// The event is marked as notified once a send was attempted, whatever its
    /// result. Unmatched and unresolved events stay unmarked and are evaluated
    /// again in the next cycles.
    async fn process_event(&mut self, event: &CalendarEvent) -> EventOutcome {
        if self.dedup.is_notified(&event.id) {
            return EventOutcome::AlreadyNotified;
        }

        let handle = match_handle(&event.description);
        if handle.is_empty() {
            debug!("event {} has no handle in its description", event.id);
            return EventOutcome::Unmatched;
        }

        let Some(chat_id) = self.dispatcher.resolve(handle).await else {
            return EventOutcome::Unresolved;
        };

        let text = compose_text(&event.summary, match_body(&event.description));
        let result = self.dispatcher.send(chat_id, &text).await;
        self.dedup.mark_notified(&event.id);

        match result {
            Ok(()) => EventOutcome::Sent,
            Err(_) => EventOutcome::SendFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MockCalendarSource;
    use crate::identity::MockIdentityStore;
    use crate::telegram::{MockMessenger, TelegramError};
    use mockall::{Sequence, predicate::eq};
    use std::sync::Arc;

    fn create_test_settings() -> PollerSettings {
        PollerSettings {
            calendar_id: "primary".to_owned(),
            window: 3600,
            max_results: 5,
            polling_interval: 60,
        }
    }

    fn create_test_event(id: &str, summary: &str, description: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_owned(),
            summary: summary.to_owned(),
            description: description.to_owned(),
        }
    }

    fn create_test_poller(
        calendar: MockCalendarSource,
        messenger: MockMessenger,
        store: MockIdentityStore,
    ) -> CalendarPoller<MockCalendarSource, MockMessenger, MockIdentityStore> {
        let dispatcher = Dispatcher::new(Arc::new(messenger), Arc::new(store));
        CalendarPoller::new(calendar, dispatcher, create_test_settings())
    }

    fn create_test_now() -> DateTime<Utc> {
        "2024-01-01T10:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn test_cycle_queries_window() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .withf(|calendar_id, time_min, time_max, max_results| {
                calendar_id == "primary"
                    && *time_min == "2024-01-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
                    && *time_max == "2024-01-01T11:00:00Z".parse::<DateTime<Utc>>().unwrap()
                    && *max_results == 5
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec![]));

        let mut poller =
            create_test_poller(mock_calendar, MockMessenger::new(), MockIdentityStore::new());

        let report = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn test_cycle_sends_composed_text() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar.expect_list_events().times(1).returning(|_, _, _, _| {
            Ok(vec![create_test_event(
                "E1",
                "Standup",
                "alice Team sync at 3pm",
            )])
        });

        let mut mock_store = MockIdentityStore::new();
        mock_store
            .expect_find_chat_id()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(Some(7)));

        let mut mock_messenger = MockMessenger::new();
        mock_messenger
            .expect_send_message()
            .with(eq(7), eq("Standup - Team sync at 3pm"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut poller = create_test_poller(mock_calendar, mock_messenger, mock_store);

        let report = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.sent, 1);
        assert!(poller.dedup.is_notified("E1"));
    }

    #[tokio::test]
    async fn test_event_notified_once_across_cycles() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .times(2)
            .returning(|_, _, _, _| Ok(vec![create_test_event("E1", "Standup", "alice now")]));

        let mut mock_store = MockIdentityStore::new();
        mock_store
            .expect_find_chat_id()
            .times(1)
            .returning(|_| Ok(Some(7)));

        let mut mock_messenger = MockMessenger::new();
        mock_messenger
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut poller = create_test_poller(mock_calendar, mock_messenger, mock_store);

        let first = poller.run_cycle(create_test_now()).await.unwrap();
        let second = poller
            .run_cycle(create_test_now() + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.sent, 0);
        assert_eq!(second.already_notified, 1);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_retried() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .times(2)
            .returning(|_, _, _, _| Ok(vec![create_test_event("E1", "Standup", "alice now")]));

        let mut mock_store = MockIdentityStore::new();
        mock_store
            .expect_find_chat_id()
            .times(1)
            .returning(|_| Ok(Some(7)));

        let mut mock_messenger = MockMessenger::new();
        mock_messenger
            .expect_send_message()
            .times(1)
            .returning(|_, _| {
                Err(TelegramError::Api {
                    error_code: Some(400),
                    description: "Bad Request: chat not found".to_owned(),
                })
            });

        let mut poller = create_test_poller(mock_calendar, mock_messenger, mock_store);

        let first = poller.run_cycle(create_test_now()).await.unwrap();
        let second = poller.run_cycle(create_test_now()).await.unwrap();

        assert_eq!(first.failed, 1);
        assert_eq!(second.already_notified, 1);
    }

    #[tokio::test]
    async fn test_unresolved_event_is_retried_next_cycle() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .times(2)
            .returning(|_, _, _, _| Ok(vec![create_test_event("E1", "Standup", "carol now")]));

        // carol registers between the two cycles
        let mut seq = Sequence::new();
        let mut mock_store = MockIdentityStore::new();
        mock_store
            .expect_find_chat_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        mock_store
            .expect_find_chat_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(9)));

        let mut mock_messenger = MockMessenger::new();
        mock_messenger
            .expect_send_message()
            .with(eq(9), eq("Standup - now"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut poller = create_test_poller(mock_calendar, mock_messenger, mock_store);

        let first = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(first.unresolved, 1);
        assert!(!poller.dedup.is_notified("E1"));

        let second = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(second.sent, 1);
    }

    #[tokio::test]
    async fn test_unmatched_events_are_skipped() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar.expect_list_events().times(1).returning(|_, _, _, _| {
            Ok(vec![
                create_test_event("E1", "No description", ""),
                create_test_event("E2", "Blank description", "   "),
            ])
        });

        // Neither the store nor the messenger are called
        let mut poller =
            create_test_poller(mock_calendar, MockMessenger::new(), MockIdentityStore::new());

        let report = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(report.unmatched, 2);
        assert_eq!(poller.dedup.len(), 0);
    }

    #[tokio::test]
    async fn test_events_processed_in_query_order() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar.expect_list_events().times(1).returning(|_, _, _, _| {
            Ok(vec![
                create_test_event("E1", "First", "alice one"),
                create_test_event("E2", "Second", "bob two"),
            ])
        });

        let mut mock_store = MockIdentityStore::new();
        mock_store
            .expect_find_chat_id()
            .with(eq("alice"))
            .returning(|_| Ok(Some(1)));
        mock_store
            .expect_find_chat_id()
            .with(eq("bob"))
            .returning(|_| Ok(Some(2)));

        let mut seq = Sequence::new();
        let mut mock_messenger = MockMessenger::new();
        mock_messenger
            .expect_send_message()
            .with(eq(1), eq("First - one"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock_messenger
            .expect_send_message()
            .with(eq(2), eq("Second - two"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut poller = create_test_poller(mock_calendar, mock_messenger, mock_store);

        let report = poller.run_cycle(create_test_now()).await.unwrap();
        assert_eq!(report.sent, 2);
    }

    #[tokio::test]
    async fn test_cycle_query_failure() {
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .times(1)
            .returning(|_, _, _, _| {
                Err(CalendarError::Status {
                    status: 503,
                    body: "backend error".to_owned(),
                })
            });

        let mut poller =
            create_test_poller(mock_calendar, MockMessenger::new(), MockIdentityStore::new());

        assert!(poller.run_cycle(create_test_now()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_query_failure() {
        let cancel = CancellationToken::new();
        let mut seq = Sequence::new();
        let mut mock_calendar = MockCalendarSource::new();

        mock_calendar
            .expect_list_events()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| {
                Err(CalendarError::Status {
                    status: 503,
                    body: "backend error".to_owned(),
                })
            });

        // The second cycle stops the loop
        let cancel_from_cycle = cancel.clone();
        mock_calendar
            .expect_list_events()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _, _| {
                cancel_from_cycle.cancel();
                Ok(vec![])
            });

        let poller =
            create_test_poller(mock_calendar, MockMessenger::new(), MockIdentityStore::new());

        let start = tokio::time::Instant::now();
        poller.run(cancel).await;

        assert!(start.elapsed() >= std::time::Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let mut mock_calendar = MockCalendarSource::new();
        mock_calendar
            .expect_list_events()
            .times(1)
            .returning(|_, _, _, _| Ok(vec![]));

        let poller =
            create_test_poller(mock_calendar, MockMessenger::new(), MockIdentityStore::new());

        // Let the first cycle run, then stop during the sleep
        let stop = async {
            tokio::task::yield_now().await;
            cancel.cancel();
        };

        tokio::join!(poller.run(cancel.clone()), stop);
    }

    #[tokio::test]
    async fn test_cycle_rejects_out_of_range_window() {
        for window in [u64::MAX / 2, u64::MAX] {
            // The calendar must not be queried
            let dispatcher = Dispatcher::new(
                Arc::new(MockMessenger::new()),
                Arc::new(MockIdentityStore::new()),
            );
            let settings = PollerSettings {
                window,
                ..create_test_settings()
            };
            let mut poller = CalendarPoller::new(MockCalendarSource::new(), dispatcher, settings);

            let result = poller.run_cycle(Utc::now()).await;
            assert!(matches!(result, Err(CalendarError::InvalidWindow(w)) if w == window));
        }
    }

    /// Calendar whose queries never complete.
    struct StalledCalendar;

    impl CalendarSource for StalledCalendar {
        async fn list_events(
            &self,
            _calendar_id: &str,
            _time_min: DateTime<Utc>,
            _time_max: DateTime<Utc>,
            _max_results: u32,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel_during_cycle() {
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            Arc::new(MockMessenger::new()),
            Arc::new(MockIdentityStore::new()),
        );
        let poller = CalendarPoller::new(StalledCalendar, dispatcher, create_test_settings());

        let stop = async {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            cancel.cancel();
        };

        let start = tokio::time::Instant::now();
        tokio::join!(poller.run(cancel.clone()), stop);

        // Stopped by the cancellation, not after a polling interval
        assert!(start.elapsed() < std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_report_display() {
        let mut report = CycleReport {
            fetched: 3,
            ..Default::default()
        };
        report.record(EventOutcome::Sent);
        report.record(EventOutcome::Unresolved);
        report.record(EventOutcome::AlreadyNotified);

        assert_eq!(
            format!("{}", report),
            "fetched=3, already_notified=1, unmatched=0, unresolved=1, sent=1, failed=0"
        );
    }
}
