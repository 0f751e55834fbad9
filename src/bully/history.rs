use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use super::types::ElectionEvent;
use crate::util::time::distance;

/// Timestamp ordered history of election events.
///
/// Delivery of election events is at-least-once, so the history collapses
/// repeats: an event with the same `(node_id, event_type)` as one already kept
/// within `dedup_window` of it is dropped.
pub struct ElectionLog {
    dedup_window: Duration,
    max_history: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    events: VecDeque<ElectionEvent>,
    next_id: u64,
}

impl ElectionLog {
    pub fn new(dedup_window: Duration, max_history: usize) -> Self {
        Self {
            dedup_window,
            max_history: max_history.max(1),
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                next_id: 1,
            }),
        }
    }

    /// Record an event; returns it with its id, or None for a duplicate
    pub fn record(&self, mut event: ElectionEvent) -> Option<ElectionEvent> {
        let mut inner = self.inner.lock();

        let duplicate = inner.events.iter().any(|e| {
            e.node_id == event.node_id
                && e.event_type == event.event_type
                && distance(e.timestamp, event.timestamp) < self.dedup_window
        });

        if duplicate {
            tracing::debug!(
                "Duplicate {} event of node {} skipped",
                event.event_type,
                event.node_id
            );
            return None;
        }

        event.id = inner.next_id;
        inner.next_id += 1;

        // Keep timestamp order even if a late event shows up
        let pos = inner
            .events
            .iter()
            .rposition(|e| e.timestamp <= event.timestamp)
            .map(|p| p + 1)
            .unwrap_or(0);
        inner.events.insert(pos, event.clone());

        while inner.events.len() > self.max_history {
            inner.events.pop_front();
        }

        Some(event)
    }

    pub fn snapshot(&self) -> Vec<ElectionEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bully::types::ElectionEventType;
    use crate::util::time::now;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_replay_within_window_is_dropped() {
        let log = ElectionLog::new(Duration::from_secs(2), 100);
        let at = now();

        let first = log.record(ElectionEvent::new(2, ElectionEventType::Winner, at));
        assert_eq!(first.map(|e| e.id), Some(1));

        let replay = ElectionEvent::new(2, ElectionEventType::Winner, at + ChronoDuration::milliseconds(500));
        assert!(log.record(replay).is_none());
        assert_eq!(log.len(), 1);

        // same type from another node is not a duplicate
        assert!(log
            .record(ElectionEvent::new(3, ElectionEventType::Winner, at))
            .is_some());
    }

    #[test]
    fn test_same_event_after_window_is_kept() {
        let log = ElectionLog::new(Duration::from_secs(2), 100);
        let at = now();

        log.record(ElectionEvent::new(1, ElectionEventType::SentElection, at));
        let later = ElectionEvent::new(
            1,
            ElectionEventType::SentElection,
            at + ChronoDuration::seconds(3),
        );
        assert!(log.record(later).is_some());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_history_is_ordered_and_capped() {
        let log = ElectionLog::new(Duration::from_millis(10), 3);
        let at = now();

        for (i, node) in [4u64, 1, 3, 2].iter().enumerate() {
            let ts = at + ChronoDuration::seconds(i as i64);
            log.record(ElectionEvent::new(*node, ElectionEventType::Candidate, ts));
        }
        // late arrival, older than everything kept
        log.record(ElectionEvent::new(
            9,
            ElectionEventType::Candidate,
            at - ChronoDuration::seconds(1),
        ));

        let events = log.snapshot();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(events.last().map(|e| e.node_id), Some(2));
    }
}
