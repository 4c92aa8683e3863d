// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed in-memory store: a keyed collection with insertion ordering,
//! deterministic ID allocation, cursor pagination, and JSON snapshotting.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Zero-padded counter width. Keeps IDs lexicographically increasing for at
/// least 10^6 records per store.
const ID_WIDTH: usize = 6;

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

/// Keyed collection of `T` with stable insertion order.
///
/// IDs are `"{prefix}_{counter}"` with a zero-padded six-digit counter.
/// All operations are safe under concurrent access; writers are serialized
/// per store.
pub struct TypedStore<T> {
    prefix: String,
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    counter: u64,
    records: IndexMap<String, T>,
}

impl<T: Clone> TypedStore<T> {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inner: RwLock::new(Inner { counter: 0, records: IndexMap::new() }),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Allocate the next ID: increments the counter and formats it.
    pub fn next_id(&self) -> String {
        let mut inner = self.inner.write();
        inner.counter += 1;
        format!("{}_{:0width$}", self.prefix, inner.counter, width = ID_WIDTH)
    }

    /// Insert or update. First insertion appends to the order; updates keep
    /// the record's existing position.
    pub fn set(&self, id: impl Into<String>, value: T) {
        self.inner.write().records.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.read().records.get(id).cloned()
    }

    /// Remove a record. Returns whether it was present.
    pub fn delete(&self, id: &str) -> bool {
        // shift_remove keeps the remaining insertion order intact.
        self.inner.write().records.shift_remove(id).is_some()
    }

    /// All records in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.inner.read().records.values().cloned().collect()
    }

    /// All IDs in insertion order.
    pub fn list_ids(&self) -> Vec<String> {
        self.inner.read().records.keys().cloned().collect()
    }

    /// Records matching the predicate, in insertion order.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.inner.read().records.values().filter(|v| pred(v)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Return up to `limit` records starting after the record whose ID equals
    /// `cursor`. An empty cursor starts from the beginning; a cursor matching
    /// no record yields an empty page. `has_more` reflects whether records
    /// remain after the returned window.
    pub fn paginate(&self, cursor: &str, limit: usize) -> Page<T> {
        let inner = self.inner.read();
        let start = if cursor.is_empty() {
            0
        } else {
            match inner.records.get_index_of(cursor) {
                Some(idx) => idx + 1,
                None => inner.records.len(),
            }
        };
        let data: Vec<T> = inner.records.values().skip(start).take(limit).cloned().collect();
        let has_more = start + data.len() < inner.records.len();
        Page { data, has_more }
    }

    /// Clear all records and restart the ID counter.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.counter = 0;
    }

    /// Clone of the full `id → record` map, in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, T> {
        self.inner.read().records.clone()
    }

    /// Replace the store contents with the given map. The ID counter is
    /// bumped past the largest `{prefix}_{n}` key present so future
    /// allocations stay unique.
    pub fn load_snapshot(&self, records: IndexMap<String, T>) {
        let mut inner = self.inner.write();
        let floor = records
            .keys()
            .filter_map(|id| id.strip_prefix(&self.prefix))
            .filter_map(|rest| rest.strip_prefix('_'))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        inner.records = records;
        inner.counter = inner.counter.max(floor);
    }
}

impl<T: Clone + Serialize + DeserializeOwned> TypedStore<T> {
    /// Snapshot as a JSON object, for the admin state plane.
    pub fn snapshot_value(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }

    /// Load store contents from a JSON object of `id → record`.
    pub fn load_snapshot_value(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        let records: IndexMap<String, T> = serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("invalid snapshot for store {:?}: {e}", self.prefix))?;
        self.load_snapshot(records);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
