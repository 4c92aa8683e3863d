// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-toggleable quirks: named divergences from documented vendor
//! behavior that a twin can opt in or out of while running.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One named behavioral divergence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quirk {
    pub id: String,
    pub summary: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
}

struct QuirkState {
    quirk: Quirk,
    default_enabled: bool,
}

/// Registry of quirks in registration order.
#[derive(Default)]
pub struct QuirkRegistry {
    quirks: RwLock<IndexMap<String, QuirkState>>,
}

impl QuirkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a quirk. The given `enabled` value is also the default that
    /// `reset_defaults` restores.
    pub fn register(&self, quirk: Quirk) {
        let default_enabled = quirk.enabled;
        self.quirks.write().insert(quirk.id.clone(), QuirkState { quirk, default_enabled });
    }

    pub fn list(&self) -> Vec<Quirk> {
        self.quirks.read().values().map(|s| s.quirk.clone()).collect()
    }

    /// Enable a quirk. Returns false for unknown IDs.
    pub fn enable(&self, id: &str) -> bool {
        self.set_enabled(id, true)
    }

    /// Disable a quirk. Returns false for unknown IDs.
    pub fn disable(&self, id: &str) -> bool {
        self.set_enabled(id, false)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.quirks.read().get(id).map(|s| s.quirk.enabled).unwrap_or(false)
    }

    /// Restore every quirk to its registered default.
    pub fn reset_defaults(&self) {
        for state in self.quirks.write().values_mut() {
            state.quirk.enabled = state.default_enabled;
        }
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.quirks.write().get_mut(id) {
            Some(state) => {
                state.quirk.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "quirk_tests.rs"]
mod tests;
