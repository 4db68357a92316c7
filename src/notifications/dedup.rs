use std::collections::HashSet;

use log::trace;

/// Ids of the events a notification was already attempted for.
///
/// Held in memory only: the set starts empty and is lost on restart.
#[derive(Debug, Default)]
pub struct NotificationDeduplicator {
    notified: HashSet<String>,
}

impl NotificationDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a notification was already attempted for `event_id`.
    pub fn is_notified(&self, event_id: &str) -> bool {
        self.notified.contains(event_id)
    }

    /// Records an attempt for `event_id`. Marking twice is a no-op.
    pub fn mark_notified(&mut self, event_id: &str) {
        if self.notified.insert(event_id.to_owned()) {
            trace!("event {} marked as notified", event_id);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.notified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_then_mark() {
        let mut dedup = NotificationDeduplicator::new();

        assert!(!dedup.is_notified("E1"));
        dedup.mark_notified("E1");
        assert!(dedup.is_notified("E1"));
        assert!(!dedup.is_notified("E2"));
    }

    #[test]
    fn test_mark_twice() {
        let mut dedup = NotificationDeduplicator::new();

        dedup.mark_notified("E1");
        dedup.mark_notified("E1");

        assert_eq!(dedup.len(), 1);
    }
}
