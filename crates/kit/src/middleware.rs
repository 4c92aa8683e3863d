// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request middleware stack for twin API routes.
//!
//! Fixed outer-to-inner order: request logger → artificial latency → fault
//! injection → idempotency replay. The admin control plane is mounted
//! outside this stack so it can never be fault-injected or replayed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;

use crate::config::LATENCY_MS_KEY;
use crate::TwinKit;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "idempotent-replayed";

/// Wrap an API router with the full middleware stack.
pub fn apply(router: Router, kit: Arc<TwinKit>) -> Router {
    router
        .layer(middleware::from_fn_with_state(Arc::clone(&kit), idempotency_layer))
        .layer(middleware::from_fn_with_state(Arc::clone(&kit), fault_layer))
        .layer(middleware::from_fn_with_state(Arc::clone(&kit), latency_layer))
        .layer(middleware::from_fn_with_state(kit, log_layer))
}

/// Record method, path, status, and duration into the request ring.
pub async fn log_layer(
    State(kit): State<Arc<TwinKit>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let resp = next.run(req).await;

    let status = resp.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(%method, %path, status, duration_ms, "request");
    kit.requests.record(crate::request_log::RequestEntry {
        method,
        path,
        status,
        duration_ms,
        timestamp: kit.clock.now_unix(),
    });
    resp
}

/// Sleep for the globally configured latency before running the handler.
pub async fn latency_layer(
    State(kit): State<Arc<TwinKit>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ms) = kit.runtime.u64(LATENCY_MS_KEY) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
    next.run(req).await
}

/// Short-circuit with the configured fault when a rule matches and its
/// probability fires.
pub async fn fault_layer(
    State(kit): State<Arc<TwinKit>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(rule) = kit.faults.match_path(req.uri().path()) {
        if rule.rate >= 1.0 || rand::random::<f64>() < rule.rate {
            if let Some(ms) = rule.latency_ms {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            let status =
                StatusCode::from_u16(rule.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = rule.body.clone().unwrap_or_else(|| {
                format!(
                    "{{\"error\":{{\"code\":\"FAULT_INJECTED\",\"message\":\"injected {} for {}\"}}}}",
                    rule.status_code,
                    req.uri().path()
                )
            });
            tracing::debug!(path = %req.uri().path(), status = rule.status_code, "fault injected");
            return (status, [(CONTENT_TYPE, "application/json")], body).into_response();
        }
    }
    next.run(req).await
}

/// Replay cached responses for repeated `Idempotency-Key` POSTs; capture
/// fresh responses on a miss.
pub async fn idempotency_layer(
    State(kit): State<Arc<TwinKit>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    let Some(key) = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        return next.run(req).await;
    };

    if let Some(rec) = kit.idempotency.get(&key) {
        tracing::debug!(%key, "idempotent replay");
        return replay_response(rec.status, rec.body);
    }

    let resp = next.run(req).await;
    let (parts, body) = resp.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(err = %e, "failed to buffer response for idempotency capture");
            return crate::error::TwinError::internal("response capture failed").into_response();
        }
    };
    kit.idempotency.store(&key, parts.status.as_u16(), bytes.clone());
    Response::from_parts(parts, Body::from(bytes))
}

fn replay_response(status: u16, body: Bytes) -> Response {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp.headers_mut().insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
    resp
}

#[cfg(test)]
#[path = "middleware_tests.rs"]
mod tests;
