use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::telemetry::{Category, Telemetry};

pub const DEFAULT_CAPACITY: usize = 30;

/// Opaque append-order key. Generation order is preserved across the whole
/// log, not per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey(u64);

#[derive(Debug, Clone)]
struct LogEntry {
    key: EntryKey,
    value: Telemetry,
}

/// Bounded, category-indexed event scratchpad.
///
/// Capacity applies across all categories; overflowing never fails, it
/// evicts the oldest entry (global FIFO). A console flood can therefore
/// starve low-frequency categories. Accepted: the log is evidence, not
/// history.
#[derive(Debug)]
pub struct TelemetryLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_key: u64,
}

impl TelemetryLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_key: 0,
        }
    }

    /// Shrinking below the current length evicts oldest-first immediately.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn add(&mut self, value: Telemetry) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry { key, value });
        key
    }

    /// Point lookup for in-place completion of a previously started entry.
    /// Returns None when the entry was evicted or the category does not
    /// match. Both are expected under load, not errors.
    pub fn get_mut(&mut self, category: Category, key: EntryKey) -> Option<&mut Telemetry> {
        self.entries
            .iter_mut()
            .find(|e| e.key == key && e.value.category() == category)
            .map(|e| &mut e.value)
    }

    /// Snapshot of one category in insertion order. A copy, not a live
    /// view: later mutation of the log does not affect it.
    pub fn all(&self, category: Category) -> Vec<Telemetry> {
        self.entries
            .iter()
            .filter(|e| e.value.category() == category)
            .map(|e| e.value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
