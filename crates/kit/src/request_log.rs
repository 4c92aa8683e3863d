// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 500;

/// Observation of one inbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEntry {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub timestamp: i64,
}

/// Bounded ring of recent requests. When full, the oldest entry is silently
/// discarded.
pub struct RequestLog {
    capacity: usize,
    entries: Mutex<VecDeque<RequestEntry>>,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn record(&self, entry: RequestEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `limit` entries, oldest first. `None` returns all.
    pub fn recent(&self, limit: Option<usize>) -> Vec<RequestEntry> {
        let entries = self.entries.lock();
        let skip = limit.map_or(0, |l| entries.len().saturating_sub(l));
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
#[path = "request_log_tests.rs"]
mod tests;
