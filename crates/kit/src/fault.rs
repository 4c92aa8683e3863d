// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-endpoint fault configuration.
//!
//! Rules are keyed by path without the leading slash (the admin route capture
//! arrives that way); lookups normalize the request path to match. Wildcards
//! are not supported — one rule per exact path.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A rule for sabotaging responses on one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRule {
    /// HTTP status to inject.
    pub status_code: u16,
    /// Probability the rule fires, in [0, 1].
    pub rate: f64,
    /// Extra latency applied when the rule fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Response body override. Defaults to a neutral JSON error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Registry of fault rules, at most one per normalized path key.
#[derive(Default)]
pub struct FaultTable {
    rules: RwLock<IndexMap<String, FaultRule>>,
}

impl FaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the rule for a path key.
    pub fn install(&self, key: &str, rule: FaultRule) {
        self.rules.write().insert(normalize(key), rule);
    }

    /// Remove the rule for a path key. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.rules.write().shift_remove(&normalize(key)).is_some()
    }

    /// Look up the rule matching a request path (leading slash tolerated).
    pub fn match_path(&self, path: &str) -> Option<FaultRule> {
        self.rules.read().get(&normalize(path)).cloned()
    }

    /// All rules, keyed by normalized path.
    pub fn list(&self) -> IndexMap<String, FaultRule> {
        self.rules.read().clone()
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

fn normalize(key: &str) -> String {
    key.trim_start_matches('/').to_owned()
}

#[cfg(test)]
#[path = "fault_tests.rs"]
mod tests;
