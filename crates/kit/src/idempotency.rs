// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded idempotency-key replay cache.
//!
//! A replay returns byte-identical status and body, and the mutation does not
//! run again. Records expire by age (read through the simulated clock, so
//! advancing time expires them) or by FIFO eviction once the cache is full.

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::clock::Clock;

const DEFAULT_MAX_ENTRIES: usize = 1024;
const DEFAULT_TTL_SECS: i64 = 24 * 3600;

/// Cached response for one idempotency key.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub status: u16,
    pub body: Bytes,
    pub created_unix: i64,
}

/// Key → captured response cache, bounded by entry count and age.
pub struct IdempotencyCache {
    clock: Arc<Clock>,
    max_entries: usize,
    ttl_secs: i64,
    inner: Mutex<IndexMap<String, IdempotencyRecord>>,
}

impl IdempotencyCache {
    pub fn new(clock: Arc<Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS)
    }

    pub fn with_limits(clock: Arc<Clock>, max_entries: usize, ttl_secs: i64) -> Self {
        Self { clock, max_entries, ttl_secs, inner: Mutex::new(IndexMap::new()) }
    }

    /// Look up a key. Expired records are dropped on read.
    pub fn get(&self, key: &str) -> Option<IdempotencyRecord> {
        let now = self.clock.now_unix();
        let mut inner = self.inner.lock();
        let expired = match inner.get(key) {
            Some(rec) if now - rec.created_unix <= self.ttl_secs => return Some(rec.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.shift_remove(key);
        }
        None
    }

    /// Capture a response under a key. First writer wins: if the key is
    /// already present the existing record is kept and `false` is returned.
    pub fn store(&self, key: &str, status: u16, body: Bytes) -> bool {
        let created_unix = self.clock.now_unix();
        let mut inner = self.inner.lock();
        if inner.contains_key(key) {
            return false;
        }
        inner.insert(key.to_owned(), IdempotencyRecord { status, body, created_unix });
        while inner.len() > self.max_entries {
            inner.shift_remove_index(0);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn reset(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
