// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario-test harness: a minimal reference twin built on the kit.
//!
//! Models a fictional "contacts" vendor with two resources: contacts
//! (create/list/get/delete with cursor pagination and webhook events) and
//! payouts (a clock-driven state machine). Exists only to exercise the kit
//! end to end; real twins live in their own crates.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use twinkit::admin::StateStore;
use twinkit::error::TwinError;
use twinkit::quirk::Quirk;
use twinkit::server::build_router;
use twinkit::store::TypedStore;
use twinkit::TwinKit;

/// Payout transitions: pending → in_transit after one hour, → paid after two.
const IN_TRANSIT_AFTER_SECS: i64 = 3600;
const PAID_AFTER_SECS: i64 = 7200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub email: String,
    pub created: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: String,
    pub amount: i64,
    pub created: i64,
}

/// The twin's record stores; doubles as its admin `StateStore`.
pub struct TwinStores {
    pub contacts: TypedStore<Contact>,
    pub payouts: TypedStore<Payout>,
}

impl TwinStores {
    fn new() -> Self {
        Self { contacts: TypedStore::new("con"), payouts: TypedStore::new("po") }
    }
}

impl StateStore for TwinStores {
    fn snapshot(&self) -> serde_json::Value {
        json!({
            "contacts": self.contacts.snapshot_value(),
            "payouts": self.payouts.snapshot_value(),
        })
    }

    fn load_state(&self, state: &serde_json::Value) -> anyhow::Result<()> {
        if let Some(contacts) = state.get("contacts") {
            self.contacts.load_snapshot_value(contacts)?;
        }
        if let Some(payouts) = state.get("payouts") {
            self.payouts.load_snapshot_value(payouts)?;
        }
        Ok(())
    }

    fn reset(&self) {
        self.contacts.reset();
        self.payouts.reset();
    }
}

/// A fully wired reference twin.
pub struct ContactsTwin {
    pub kit: Arc<TwinKit>,
    pub stores: Arc<TwinStores>,
}

impl ContactsTwin {
    pub fn new() -> Self {
        twinkit::server::ensure_crypto();
        let kit = TwinKit::new("evt");
        kit.runtime.set("latency_ms", json!(0));
        kit.quirks.register(Quirk {
            id: "empty-list-as-null".to_owned(),
            summary: "list endpoints return null instead of [] when empty".to_owned(),
            enabled: false,
            kind: "response".to_owned(),
            severity: "low".to_owned(),
        });
        Self { kit, stores: Arc::new(TwinStores::new()) }
    }

    /// Full router: API routes behind the middleware stack, plus the admin
    /// plane.
    pub fn router(&self) -> Router {
        let state = AppState { kit: Arc::clone(&self.kit), stores: Arc::clone(&self.stores) };
        let api = Router::new()
            .route("/v1/contacts", post(create_contact).get(list_contacts))
            .route("/v1/contacts/{id}", get(get_contact).delete(delete_contact))
            .route("/v1/payouts", post(create_payout))
            .route("/v1/payouts/{id}", get(get_payout))
            .with_state(state);
        build_router(api, &self.kit, Arc::clone(&self.stores) as Arc<dyn StateStore>)
    }
}

impl Default for ContactsTwin {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    kit: Arc<TwinKit>,
    stores: Arc<TwinStores>,
}

// -- Contact handlers ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateContactRequest {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    starting_after: Option<String>,
}

/// `POST /v1/contacts`
async fn create_contact(
    State(s): State<AppState>,
    Json(req): Json<CreateContactRequest>,
) -> impl IntoResponse {
    let Some(email) = req.email.filter(|e| !e.is_empty()) else {
        return TwinError::bad_request("email is required").into_response();
    };

    let id = s.stores.contacts.next_id();
    let contact = Contact { id: id.clone(), email, created: s.kit.clock.now_unix() };
    s.stores.contacts.set(id, contact.clone());

    s.kit
        .dispatcher
        .enqueue("contact.created", serde_json::to_value(&contact).unwrap_or_default());

    (StatusCode::CREATED, Json(contact)).into_response()
}

/// `GET /v1/contacts` — cursor pagination via `starting_after` / `limit`.
async fn list_contacts(State(s): State<AppState>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    let cursor = q.starting_after.unwrap_or_default();
    let page = s.stores.contacts.paginate(&cursor, q.limit.unwrap_or(10));
    Json(json!({"data": page.data, "has_more": page.has_more}))
}

/// `GET /v1/contacts/{id}`
async fn get_contact(State(s): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match s.stores.contacts.get(&id) {
        Some(contact) => Json(contact).into_response(),
        None => TwinError::not_found(format!("no contact {id:?}")).into_response(),
    }
}

/// `DELETE /v1/contacts/{id}`
async fn delete_contact(State(s): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if s.stores.contacts.delete(&id) {
        Json(json!({"id": id, "deleted": true})).into_response()
    } else {
        TwinError::not_found(format!("no contact {id:?}")).into_response()
    }
}

// -- Payout handlers ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreatePayoutRequest {
    #[serde(default)]
    amount: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PayoutView {
    id: String,
    amount: i64,
    created: i64,
    status: &'static str,
}

fn payout_view(payout: Payout, now: i64) -> PayoutView {
    let age = now - payout.created;
    let status = if age >= PAID_AFTER_SECS {
        "paid"
    } else if age >= IN_TRANSIT_AFTER_SECS {
        "in_transit"
    } else {
        "pending"
    };
    PayoutView { id: payout.id, amount: payout.amount, created: payout.created, status }
}

/// `POST /v1/payouts`
async fn create_payout(
    State(s): State<AppState>,
    Json(req): Json<CreatePayoutRequest>,
) -> impl IntoResponse {
    let Some(amount) = req.amount else {
        return TwinError::bad_request("amount is required").into_response();
    };

    let id = s.stores.payouts.next_id();
    let payout = Payout { id: id.clone(), amount, created: s.kit.clock.now_unix() };
    s.stores.payouts.set(id, payout.clone());

    let view = payout_view(payout, s.kit.clock.now_unix());
    (StatusCode::CREATED, Json(view)).into_response()
}

/// `GET /v1/payouts/{id}` — status derives from the simulated clock.
async fn get_payout(State(s): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match s.stores.payouts.get(&id) {
        Some(payout) => Json(payout_view(payout, s.kit.clock.now_unix())).into_response(),
        None => TwinError::not_found(format!("no payout {id:?}")).into_response(),
    }
}

// -- Webhook capture target ---------------------------------------------------

/// One request observed by [`CaptureTarget`].
pub struct CapturedDelivery {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// A local HTTP server that records webhook deliveries and answers with a
/// scripted status sequence (empty script means always 200).
pub struct CaptureTarget {
    pub hits: Mutex<Vec<CapturedDelivery>>,
    script: Mutex<VecDeque<u16>>,
}

impl CaptureTarget {
    /// Spawn the target; returns its URL and a handle to the captured state.
    pub async fn spawn(script: &[u16]) -> anyhow::Result<(String, Arc<Self>)> {
        let target = Arc::new(Self {
            hits: Mutex::new(Vec::new()),
            script: Mutex::new(script.iter().copied().collect()),
        });
        let router =
            Router::new().route("/", post(capture_delivery)).with_state(Arc::clone(&target));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok((format!("http://{addr}/"), target))
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }
}

async fn capture_delivery(
    State(target): State<Arc<CaptureTarget>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> StatusCode {
    let parsed = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    target.hits.lock().push(CapturedDelivery { headers, body: parsed });
    let status = target.script.lock().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}
