// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The uniform `/admin/*` control plane every twin mounts.
//!
//! State operations delegate to a pluggable [`StateStore`]; webhooks, runtime
//! config, and quirks are optional capability slots — an empty slot answers
//! 404 (or a neutral status for webhook flush), never a 5xx.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::clock::{epoch_ms, format_duration, parse_duration, Clock};
use crate::error::TwinError;
use crate::fault::{FaultRule, FaultTable};
use crate::idempotency::IdempotencyCache;
use crate::quirk::QuirkRegistry;
use crate::request_log::RequestLog;
use crate::webhook::Dispatcher;
use crate::TwinKit;

// -- Capability contracts -----------------------------------------------------

/// Snapshot/load/reset over a twin's full record state.
///
/// The snapshot is a single JSON object whose top-level keys are store names
/// and whose values are `id → record` maps. Loading ignores unknown keys and
/// leaves stores absent from the snapshot untouched.
pub trait StateStore: Send + Sync {
    fn snapshot(&self) -> serde_json::Value;
    fn load_state(&self, state: &serde_json::Value) -> anyhow::Result<()>;
    fn reset(&self);
}

/// Webhook capability slot backing `/admin/webhooks/*`.
#[async_trait]
pub trait WebhookFlusher: Send + Sync {
    async fn flush(&self) -> anyhow::Result<()>;
    fn deliveries(&self) -> serde_json::Value;
    fn queued_events(&self) -> serde_json::Value;
    fn reset(&self);
}

#[async_trait]
impl WebhookFlusher for Dispatcher {
    async fn flush(&self) -> anyhow::Result<()> {
        Dispatcher::flush(self).await
    }

    fn deliveries(&self) -> serde_json::Value {
        serde_json::to_value(Dispatcher::deliveries(self)).unwrap_or_default()
    }

    fn queued_events(&self) -> serde_json::Value {
        serde_json::to_value(Dispatcher::queued_events(self)).unwrap_or_default()
    }

    fn reset(&self) {
        Dispatcher::reset(self);
    }
}

/// Runtime config capability slot backing `GET/PUT /admin/config`.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> serde_json::Value;
    fn merge(&self, updates: &serde_json::Value) -> anyhow::Result<serde_json::Value>;
}

// -- Admin state --------------------------------------------------------------

/// Handles the admin plane operates on. Slots left `None` disable the
/// corresponding endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub clock: Arc<Clock>,
    pub store: Arc<dyn StateStore>,
    pub faults: Arc<FaultTable>,
    pub requests: Arc<RequestLog>,
    pub idempotency: Arc<IdempotencyCache>,
    pub flusher: Option<Arc<dyn WebhookFlusher>>,
    pub config: Option<Arc<dyn ConfigProvider>>,
    pub quirks: Option<Arc<QuirkRegistry>>,
}

impl AdminState {
    /// Wire the admin plane to a kit, with every capability slot filled.
    pub fn new(kit: &TwinKit, store: Arc<dyn StateStore>) -> Self {
        Self {
            clock: Arc::clone(&kit.clock),
            store,
            faults: Arc::clone(&kit.faults),
            requests: Arc::clone(&kit.requests),
            idempotency: Arc::clone(&kit.idempotency),
            flusher: Some(Arc::clone(&kit.dispatcher) as Arc<dyn WebhookFlusher>),
            config: Some(Arc::clone(&kit.runtime) as Arc<dyn ConfigProvider>),
            quirks: Some(Arc::clone(&kit.quirks)),
        }
    }
}

/// Build the admin router. Every twin mounts this identically.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/health", get(health))
        .route("/admin/reset", post(reset))
        .route("/admin/state", get(get_state).post(load_state))
        .route("/admin/fault/{*key}", post(install_fault).delete(remove_fault))
        .route("/admin/faults", get(list_faults))
        .route("/admin/requests", get(list_requests))
        .route("/admin/time/advance", post(advance_time))
        .route("/admin/time", get(get_time))
        .route("/admin/webhooks/flush", post(flush_webhooks))
        .route("/admin/webhooks/deliveries", get(list_deliveries))
        .route("/admin/webhooks/events", get(list_queued_events))
        .route("/admin/config", get(get_config).put(put_config))
        .route("/admin/quirks", get(list_quirks))
        .route("/admin/quirks/{id}", put(enable_quirk).delete(disable_quirk))
        .with_state(state)
}

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct AdvanceRequest {
    duration: String,
}

#[derive(Debug, Serialize)]
struct AdvanceResponse {
    status: &'static str,
    offset: String,
}

#[derive(Debug, Serialize)]
struct TimeResponse {
    real_ms: u64,
    simulated_ms: u64,
    offset: String,
}

#[derive(Debug, Deserialize)]
struct RequestsQuery {
    limit: Option<usize>,
}

// -- Handlers -----------------------------------------------------------------

/// Unwrap a JSON body extraction, mapping axum's rejection (malformed JSON,
/// missing field, wrong content type) into the 400 admin error envelope.
fn require_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(TwinError::bad_request(rejection.body_text()).into_response()),
    }
}

/// `GET /admin/health`
async fn health() -> impl IntoResponse {
    Json(StatusResponse { status: "ok" })
}

/// `POST /admin/reset` — clear record state, clock, idempotency cache, and
/// dispatcher. Installed faults, quirk toggles, and runtime config survive.
async fn reset(State(s): State<AdminState>) -> impl IntoResponse {
    s.store.reset();
    s.clock.reset();
    s.idempotency.reset();
    if let Some(ref flusher) = s.flusher {
        flusher.reset();
    }
    tracing::info!("twin state reset");
    Json(StatusResponse { status: "reset" })
}

/// `GET /admin/state`
async fn get_state(State(s): State<AdminState>) -> impl IntoResponse {
    Json(s.store.snapshot())
}

/// `POST /admin/state` — load a full snapshot.
async fn load_state(
    State(s): State<AdminState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let body = match require_json(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    match s.store.load_state(&body) {
        Ok(()) => Json(StatusResponse { status: "loaded" }).into_response(),
        Err(e) => TwinError::bad_request(e.to_string()).into_response(),
    }
}

/// `POST /admin/fault/{key}` — install a fault rule for a path.
async fn install_fault(
    State(s): State<AdminState>,
    Path(key): Path<String>,
    body: Result<Json<FaultRule>, JsonRejection>,
) -> impl IntoResponse {
    let rule = match require_json(body) {
        Ok(rule) => rule,
        Err(resp) => return resp,
    };
    if !(0.0..=1.0).contains(&rule.rate) {
        return TwinError::bad_request(format!("rate must be in [0, 1], got {}", rule.rate))
            .into_response();
    }
    if !(100..=599).contains(&rule.status_code) {
        return TwinError::bad_request(format!("invalid status code {}", rule.status_code))
            .into_response();
    }
    tracing::info!(%key, status = rule.status_code, rate = rule.rate, "fault installed");
    s.faults.install(&key, rule);
    Json(StatusResponse { status: "installed" }).into_response()
}

/// `DELETE /admin/fault/{key}`
async fn remove_fault(State(s): State<AdminState>, Path(key): Path<String>) -> impl IntoResponse {
    if s.faults.remove(&key) {
        tracing::info!(%key, "fault removed");
        Json(StatusResponse { status: "removed" }).into_response()
    } else {
        TwinError::not_found(format!("no fault for {key:?}")).into_response()
    }
}

/// `GET /admin/faults`
async fn list_faults(State(s): State<AdminState>) -> impl IntoResponse {
    Json(s.faults.list())
}

/// `GET /admin/requests`
async fn list_requests(
    State(s): State<AdminState>,
    Query(q): Query<RequestsQuery>,
) -> impl IntoResponse {
    Json(s.requests.recent(q.limit))
}

/// `POST /admin/time/advance` — body `{"duration":"1h"}`.
async fn advance_time(
    State(s): State<AdminState>,
    body: Result<Json<AdvanceRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match require_json(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match parse_duration(&req.duration) {
        Ok(nanos) => {
            s.clock.advance(nanos);
            let offset = format_duration(s.clock.offset_nanos());
            tracing::info!(advanced = %req.duration, %offset, "simulated time advanced");
            Json(AdvanceResponse { status: "advanced", offset }).into_response()
        }
        Err(e) => TwinError::bad_request(e.to_string()).into_response(),
    }
}

/// `GET /admin/time`
async fn get_time(State(s): State<AdminState>) -> impl IntoResponse {
    Json(TimeResponse {
        real_ms: epoch_ms(),
        simulated_ms: s.clock.now_ms(),
        offset: format_duration(s.clock.offset_nanos()),
    })
}

/// `POST /admin/webhooks/flush` — synchronous dispatcher flush.
async fn flush_webhooks(State(s): State<AdminState>) -> impl IntoResponse {
    let Some(ref flusher) = s.flusher else {
        return Json(StatusResponse { status: "no_webhooks_configured" }).into_response();
    };
    match flusher.flush().await {
        Ok(()) => Json(StatusResponse { status: "flushed" }).into_response(),
        Err(e) => TwinError::internal(e.to_string()).into_response(),
    }
}

/// `GET /admin/webhooks/deliveries`
async fn list_deliveries(State(s): State<AdminState>) -> impl IntoResponse {
    match s.flusher {
        Some(ref flusher) => Json(flusher.deliveries()),
        None => Json(serde_json::Value::Array(vec![])),
    }
}

/// `GET /admin/webhooks/events`
async fn list_queued_events(State(s): State<AdminState>) -> impl IntoResponse {
    match s.flusher {
        Some(ref flusher) => Json(flusher.queued_events()),
        None => Json(serde_json::Value::Array(vec![])),
    }
}

/// `GET /admin/config`
async fn get_config(State(s): State<AdminState>) -> impl IntoResponse {
    match s.config {
        Some(ref config) => Json(config.current()).into_response(),
        None => TwinError::not_found("config not configured").into_response(),
    }
}

/// `PUT /admin/config` — shallow-merge updates into the runtime config.
async fn put_config(
    State(s): State<AdminState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let Some(ref config) = s.config else {
        return TwinError::not_found("config not configured").into_response();
    };
    let body = match require_json(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    match config.merge(&body) {
        Ok(merged) => Json(merged).into_response(),
        Err(e) => TwinError::bad_request(e.to_string()).into_response(),
    }
}

/// `GET /admin/quirks`
async fn list_quirks(State(s): State<AdminState>) -> impl IntoResponse {
    match s.quirks {
        Some(ref quirks) => Json(quirks.list()).into_response(),
        None => TwinError::not_found("quirks not configured").into_response(),
    }
}

/// `PUT /admin/quirks/{id}` — enable a quirk.
async fn enable_quirk(State(s): State<AdminState>, Path(id): Path<String>) -> impl IntoResponse {
    toggle_quirk(&s, &id, true)
}

/// `DELETE /admin/quirks/{id}` — disable a quirk.
async fn disable_quirk(State(s): State<AdminState>, Path(id): Path<String>) -> impl IntoResponse {
    toggle_quirk(&s, &id, false)
}

fn toggle_quirk(s: &AdminState, id: &str, enabled: bool) -> Response {
    let Some(ref quirks) = s.quirks else {
        return TwinError::not_found("quirks not configured").into_response();
    };
    let changed = if enabled { quirks.enable(id) } else { quirks.disable(id) };
    if changed {
        tracing::info!(quirk = %id, enabled, "quirk toggled");
        Json(StatusResponse { status: if enabled { "enabled" } else { "disabled" } })
            .into_response()
    } else {
        TwinError::not_found(format!("unknown quirk {id:?}")).into_response()
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
