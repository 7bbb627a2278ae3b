//! Bounded in-memory copy of the proxy's message log.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use sle_proto::LogEntry;

use crate::bus::{Event, EventBus, Topic};
use crate::view::ConsoleView;

/// Newest-first log of proxy messages, capped at a fixed size.
pub struct MessageLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    view: Arc<dyn ConsoleView>,
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl MessageLog {
    /// Create an empty log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, view: Arc<dyn ConsoleView>) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            view,
        }
    }

    /// Subscribe to live log messages.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let weak: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::LogMessage, move |event| {
            if let (Some(this), Event::LogMessage(entry)) = (weak.upgrade(), event) {
                this.push(entry.clone());
            }
        });
    }

    /// Replace the contents with the server's history, given oldest first.
    pub fn seed(&self, history: Vec<LogEntry>) {
        let mut entries = self.entries.lock();
        entries.clear();
        for entry in history.into_iter().rev().take(self.capacity) {
            entries.push_back(entry);
        }
    }

    /// Add the newest entry, dropping the oldest once full.
    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        {
            let mut entries = self.entries.lock();
            if entries.len() == self.capacity {
                entries.pop_back();
            }
            entries.push_front(entry.clone());
        }
        self.view.log_appended(&entry);
    }

    /// Entries, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Maximum number of entries kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::NullView;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            time: "2024-100T00:00:00".into(),
            level: "INFO".into(),
            message: message.into(),
        }
    }

    fn messages(log: &MessageLog) -> Vec<String> {
        log.entries().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_seed_is_newest_first() {
        let log = MessageLog::new(10, Arc::new(NullView));
        log.seed(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(messages(&log), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_seed_keeps_newest_when_over_capacity() {
        let log = MessageLog::new(2, Arc::new(NullView));
        log.seed(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(messages(&log), vec!["c", "b"]);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let log = MessageLog::new(2, Arc::new(NullView));
        log.push(entry("a"));
        log.push(entry("b"));
        log.push(entry("c"));
        assert_eq!(messages(&log), vec!["c", "b"]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let log = MessageLog::new(0, Arc::new(NullView));
        log.push(entry("a"));
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_live_messages_from_bus() {
        let bus = EventBus::new();
        let log = Arc::new(MessageLog::new(5, Arc::new(NullView)));
        log.attach(&bus);
        bus.publish(&Event::LogMessage(entry("live")));
        assert_eq!(messages(&log), vec!["live"]);
    }
}
