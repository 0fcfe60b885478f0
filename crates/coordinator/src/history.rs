//! Bounded in-memory log of processed queries.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Summary of one `process_query` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub query: String,
    pub agent_used: String,
    /// Seconds
    pub execution_time: f64,
    pub success: bool,
}

impl HistoryEntry {
    pub fn new(
        user_id: impl Into<String>,
        query: impl Into<String>,
        agent_used: impl Into<String>,
        execution_time: Duration,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            query: query.into(),
            agent_used: agent_used.into(),
            execution_time: execution_time.as_secs_f64(),
            success,
        }
    }
}

/// FIFO of history entries capped at `capacity`.
///
/// Append and eviction happen under one lock, so the cap holds even with
/// concurrent writers.
#[derive(Debug)]
pub struct HistoryLedger {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the retained entries, optionally filtered by user, oldest first.
    pub fn entries(&self, user_id: Option<&str>) -> Vec<HistoryEntry> {
        let entries = self.entries.lock();
        match user_id {
            Some(user) => entries.iter().filter(|e| e.user_id == user).cloned().collect(),
            None => entries.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(user: &str, query: &str) -> HistoryEntry {
        HistoryEntry::new(user, query, "GeneralAgent", Duration::from_millis(5), true)
    }

    #[test]
    fn evicts_oldest_first() {
        let ledger = HistoryLedger::new(3);
        for i in 0..5 {
            ledger.record(entry("u", &format!("q{i}")));
        }
        let queries: Vec<_> = ledger.entries(None).into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn filters_by_user_in_order() {
        let ledger = HistoryLedger::new(10);
        ledger.record(entry("u1", "a"));
        ledger.record(entry("u2", "b"));
        ledger.record(entry("u1", "c"));

        let u1: Vec<_> = ledger.entries(Some("u1")).into_iter().map(|e| e.query).collect();
        assert_eq!(u1, vec!["a", "c"]);
        assert_eq!(ledger.entries(None).len(), 3);
        assert!(ledger.entries(Some("nobody")).is_empty());
    }

    #[test]
    fn returned_entries_are_a_copy() {
        let ledger = HistoryLedger::new(10);
        ledger.record(entry("u1", "a"));
        let mut copy = ledger.entries(None);
        copy.clear();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn concurrent_appends_respect_cap() {
        let ledger = Arc::new(HistoryLedger::new(50));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..40 {
                        ledger.record(entry(&format!("u{t}"), &format!("q{i}")));
                        assert!(ledger.len() <= 50);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(ledger.len(), 50);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let ledger = HistoryLedger::new(0);
        ledger.record(entry("u", "a"));
        ledger.record(entry("u", "b"));
        assert_eq!(ledger.capacity(), 1);
        assert_eq!(ledger.entries(None)[0].query, "b");
    }
}
