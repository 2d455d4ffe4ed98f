//! Scan history.
//!
//! Every accepted decode is recorded here. Callers that resolve a code to
//! something (a product, an order line) can attach that as `match_ref`.
//! Entries are deduplicated by code with the most recently seen one at the
//! front.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of entries kept before the oldest are evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One deduplicated scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanHistoryEntry {
    /// Decoded barcode text
    pub code: String,
    /// Opaque reference to whatever the code resolved to (product id etc.)
    pub match_ref: Option<String>,
    /// Last time this code was seen, in millis on the recorder's clock
    /// (unix millis for [`ScanHistory::record_now`])
    pub last_seen_ms: i64,
    /// How many times it has been scanned
    pub occurrence_count: u32,
}

/// Bounded, most-recent-first scan history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHistory {
    entries: VecDeque<ScanHistoryEntry>,
    capacity: usize,
}

impl Default for ScanHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ScanHistory {
    /// Create an empty history holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    /// Record a scan at `now_ms`.
    ///
    /// An existing entry for `code` is bumped, moved to the front and keeps
    /// its previous `match_ref` unless a new one is supplied.
    pub fn record(&mut self, code: &str, match_ref: Option<String>, now_ms: i64) -> &ScanHistoryEntry {
        let position = self.entries.iter().position(|e| e.code == code);
        let entry = match position.and_then(|idx| self.entries.remove(idx)) {
            Some(mut existing) => {
                existing.last_seen_ms = now_ms;
                existing.occurrence_count = existing.occurrence_count.saturating_add(1);
                if match_ref.is_some() {
                    existing.match_ref = match_ref;
                }
                existing
            }
            None => ScanHistoryEntry {
                code: code.to_string(),
                match_ref,
                last_seen_ms: now_ms,
                occurrence_count: 1,
            },
        };

        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Record a scan stamped with the current wall-clock time.
    pub fn record_now(&mut self, code: &str, match_ref: Option<String>) -> &ScanHistoryEntry {
        self.record(code, match_ref, Utc::now().timestamp_millis())
    }

    /// Look up an entry by code.
    pub fn get(&self, code: &str) -> Option<&ScanHistoryEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &ScanHistoryEntry> {
        self.entries.iter()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_promote() {
        let mut history = ScanHistory::default();
        history.record("A", None, 1);
        history.record("B", None, 2);
        history.record("A", Some("sku-1".into()), 3);

        let codes: Vec<_> = history.entries().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);

        let a = history.get("A").unwrap();
        assert_eq!(a.occurrence_count, 2);
        assert_eq!(a.last_seen_ms, 3);
        assert_eq!(a.match_ref.as_deref(), Some("sku-1"));
    }

    #[test]
    fn test_match_ref_kept_when_not_supplied() {
        let mut history = ScanHistory::default();
        history.record("A", Some("sku-1".into()), 1);
        history.record("A", None, 2);
        assert_eq!(history.get("A").unwrap().match_ref.as_deref(), Some("sku-1"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = ScanHistory::with_capacity(2);
        history.record("A", None, 1);
        history.record("B", None, 2);
        history.record("C", None, 3);

        assert_eq!(history.len(), 2);
        assert!(history.get("A").is_none());
        assert_eq!(history.entries().next().unwrap().code, "C");
    }

    #[test]
    fn test_record_now_uses_wall_clock() {
        let before = Utc::now().timestamp_millis();
        let mut history = ScanHistory::default();
        let stamped = history.record_now("A", None).last_seen_ms;
        assert!(stamped >= before);
        assert!(stamped <= Utc::now().timestamp_millis());

        history.clear();
        assert!(history.is_empty());
    }
}
