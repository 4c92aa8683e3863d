// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twin Kit: the shared runtime every WonderTwin service twin embeds.
//!
//! A twin is an in-memory replica of a third-party SaaS API, faithful enough
//! that the vendor's official SDK cannot tell the difference. The kit
//! provides the parts every twin shares — typed stores, a simulated clock,
//! the request middleware stack, the webhook dispatcher, and the uniform
//! `/admin/*` control plane — while individual twins contribute only their
//! vendor-specific handlers.

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod idempotency;
pub mod middleware;
pub mod quirk;
pub mod request_log;
pub mod server;
pub mod store;
pub mod webhook;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::RuntimeConfig;
use crate::fault::FaultTable;
use crate::idempotency::IdempotencyCache;
use crate::quirk::QuirkRegistry;
use crate::request_log::RequestLog;
use crate::webhook::Dispatcher;

/// Shared runtime handles for one twin instance.
///
/// Everything a handler needs — clock, stores' companions, dispatcher — is
/// reached through this struct. Handlers hold `Arc` clones and never own the
/// subsystems.
pub struct TwinKit {
    pub clock: Arc<Clock>,
    pub faults: Arc<FaultTable>,
    pub requests: Arc<RequestLog>,
    pub idempotency: Arc<IdempotencyCache>,
    pub dispatcher: Arc<Dispatcher>,
    pub runtime: Arc<RuntimeConfig>,
    pub quirks: Arc<QuirkRegistry>,
    pub shutdown: CancellationToken,
}

impl TwinKit {
    /// Build a kit. `event_prefix` is the twin-specific webhook event ID
    /// prefix (e.g. `"evt"`).
    pub fn new(event_prefix: impl Into<String>) -> Arc<Self> {
        let clock = Arc::new(Clock::new());
        Arc::new(Self {
            faults: Arc::new(FaultTable::new()),
            requests: Arc::new(RequestLog::default()),
            idempotency: Arc::new(IdempotencyCache::new(Arc::clone(&clock))),
            dispatcher: Arc::new(Dispatcher::new(event_prefix, Arc::clone(&clock))),
            runtime: Arc::new(RuntimeConfig::new()),
            quirks: Arc::new(QuirkRegistry::new()),
            shutdown: CancellationToken::new(),
            clock,
        })
    }
}
