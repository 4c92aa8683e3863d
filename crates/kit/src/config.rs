// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup flags and the runtime-mutable config registry.

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::admin::ConfigProvider;

/// Startup configuration for a twin process.
#[derive(Debug, Clone, clap::Parser)]
pub struct TwinConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "TWIN_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 4010, env = "TWIN_PORT")]
    pub port: u16,

    /// Enable debug-level logging.
    #[arg(long, env = "TWIN_VERBOSE")]
    pub verbose: bool,

    /// Path to a JSON seed snapshot loaded into the state store at startup.
    #[arg(long, env = "TWIN_SEED_FILE")]
    pub seed_file: Option<std::path::PathBuf>,

    /// Delivery URL for webhook events.
    #[arg(long, env = "TWIN_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Artificial latency applied to every API request, in milliseconds.
    #[arg(long, default_value_t = 0, env = "TWIN_LATENCY_MS")]
    pub latency_ms: u64,
}

/// Well-known runtime config key read by the latency middleware.
pub const LATENCY_MS_KEY: &str = "latency_ms";

/// Runtime-mutable settings exposed at `GET/PUT /admin/config`.
///
/// A flat JSON object; `PUT` shallow-merges top-level keys.
#[derive(Default)]
pub struct RuntimeConfig {
    values: Mutex<Map<String, Value>>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: Value) -> Self {
        let values = match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { values: Mutex::new(values) }
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_owned(), value);
    }

    /// Current settings as a JSON object.
    pub fn get(&self) -> Value {
        Value::Object(self.values.lock().clone())
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.values.lock().get(key).and_then(Value::as_u64)
    }

    /// Shallow-merge the top-level keys of a JSON object into the settings,
    /// returning the merged result.
    pub fn merge(&self, updates: &Value) -> anyhow::Result<Value> {
        let updates = updates
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("config update must be a JSON object"))?;
        let mut values = self.values.lock();
        for (key, value) in updates {
            values.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(values.clone()))
    }
}

impl ConfigProvider for RuntimeConfig {
    fn current(&self) -> Value {
        self.get()
    }

    fn merge(&self, updates: &Value) -> anyhow::Result<Value> {
        RuntimeConfig::merge(self, updates)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
