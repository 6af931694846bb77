//! history.rs: bounded in-memory log of scoring ticks (oldest evicted first).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::region::Region;

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Monotonic tick sequence number, starting at 1.
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub hotspot: Region,
    pub scores: BTreeMap<Region, f64>,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<VecDeque<HistoryEntry>>,
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = if cap == 0 { DEFAULT_CAPACITY } else { cap.min(10_000) };
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        // entries are immutable once pushed, so a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, entry: HistoryEntry) {
        let mut v = self.lock();
        v.push_back(entry);
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    /// Last `n` entries, oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.lock();
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tick: u64) -> HistoryEntry {
        HistoryEntry {
            tick,
            timestamp: Utc::now(),
            hotspot: Region::Iran,
            scores: BTreeMap::new(),
        }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let h = History::with_capacity(3);
        for t in 1..=5 {
            h.push(entry(t));
        }
        let all = h.snapshot_last_n(10);
        assert_eq!(all.iter().map(|e| e.tick).collect::<Vec<_>>(), [3, 4, 5]);
        assert_eq!(h.snapshot_last_n(2)[0].tick, 4);
        assert!(h.snapshot_last_n(0).is_empty());
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        assert_eq!(History::with_capacity(0).capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn serializes_region_keys_as_ids() {
        let mut e = entry(1);
        e.scores.insert(Region::TaiwanStrait, 12.5);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["hotspot"], "iran");
        assert_eq!(v["scores"]["taiwan-strait"], 12.5);
    }
}
