use std::collections::VecDeque;

use shared::domain::{LogEntry, LogLevel};

pub const CLEARED_MARKER: &str = "Logs cleared";

/// Bounded activity log, oldest entry first.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends at the end, evicting the oldest entry once the buffer is full.
    pub fn append(&mut self, level: LogLevel, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(level, text);
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    pub fn clear(&mut self) -> LogEntry {
        self.entries.clear();
        self.append(LogLevel::Info, CLEARED_MARKER)
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
