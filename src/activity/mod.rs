use std::collections::VecDeque;

use chrono::{DateTime, Local};

/// Upper bound on retained entries; the oldest entry is evicted past this.
pub const LOG_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ActivityEntry {
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Local>,
}

/// Bounded, newest-first log of user-visible events. Feeds both the log
/// panel and toast notifications; nothing here survives a restart.
#[derive(Default)]
pub struct ActivityRecorder {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at the head, evicting the oldest past capacity.
    pub fn record(&mut self, message: impl Into<String>, severity: Severity) {
        self.entries.push_front(ActivityEntry {
            message: message.into(),
            severity,
            timestamp: Local::now(),
        });
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// Empty the log, leaving a single synthetic entry behind so the panel
    /// never renders blank after an explicit clear.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.record("Activity log cleared", Severity::Info);
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_entry_is_first() {
        let mut log = ActivityRecorder::new();
        log.record("first", Severity::Info);
        log.record("second", Severity::Success);
        let head = log.entries().next().unwrap();
        assert_eq!(head.message, "second");
        assert_eq!(head.severity, Severity::Success);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut log = ActivityRecorder::new();
        for i in 0..LOG_CAPACITY * 3 {
            log.record(format!("entry {i}"), Severity::Info);
            assert!(log.len() <= LOG_CAPACITY);
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        // Eviction happens at the tail, so the head is always the latest.
        assert_eq!(log.entries().next().unwrap().message, "entry 149");
        assert_eq!(
            log.entries().last().unwrap().message,
            format!("entry {}", LOG_CAPACITY * 2)
        );
    }

    #[test]
    fn clear_leaves_single_synthetic_entry() {
        let mut log = ActivityRecorder::new();
        log.record("something", Severity::Warning);
        log.clear();
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries().next().unwrap().message, "Activity log cleared");
    }
}
