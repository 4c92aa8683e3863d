// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driven through the reference contacts twin.
//!
//! Uses `axum_test::TestServer` — no real TCP needed except for the local
//! webhook capture target.

use std::time::Duration;

use axum_test::TestServer;
use serde_json::json;

use twinkit_specs::{CaptureTarget, ContactsTwin};

fn test_server(twin: &ContactsTwin) -> TestServer {
    twinkit::server::ensure_crypto();
    TestServer::new(twin.router()).expect("failed to create test server")
}

async fn create_contact(server: &TestServer, email: &str) -> serde_json::Value {
    let resp = server.post("/v1/contacts").json(&json!({"email": email})).await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    resp.json()
}

// -- Scenario A: state reset --------------------------------------------------

#[tokio::test]
async fn reset_returns_twin_to_genesis() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    server.get("/admin/health").await.assert_status_ok();

    let contact = create_contact(&server, "a@b.c").await;
    assert_eq!(contact["id"], "con_000001");

    server.post("/admin/reset").await.assert_status_ok();

    let list: serde_json::Value = server.get("/v1/contacts").await.json();
    assert_eq!(list["data"], json!([]));
    assert_eq!(list["has_more"], false);

    // ID allocation starts over.
    let again = create_contact(&server, "a@b.c").await;
    assert_eq!(again["id"], "con_000001");
    Ok(())
}

// -- Scenario B: pagination ---------------------------------------------------

#[tokio::test]
async fn pagination_enumerates_every_record_once() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    let mut ids = Vec::new();
    for i in 0..5 {
        let contact = create_contact(&server, &format!("user{i}@example.com")).await;
        ids.push(contact["id"].as_str().unwrap_or_default().to_owned());
    }

    let p1: serde_json::Value = server.get("/v1/contacts").add_query_param("limit", 2).await.json();
    assert_eq!(p1["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(p1["has_more"], true);

    let p2: serde_json::Value = server
        .get("/v1/contacts")
        .add_query_param("starting_after", &ids[1])
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(p2["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(p2["has_more"], true);

    let p3: serde_json::Value = server
        .get("/v1/contacts")
        .add_query_param("starting_after", &ids[3])
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(p3["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(p3["has_more"], false);

    let mut seen = Vec::new();
    for page in [&p1, &p2, &p3] {
        for item in page["data"].as_array().into_iter().flatten() {
            seen.push(item["id"].as_str().unwrap_or_default().to_owned());
        }
    }
    assert_eq!(seen, ids);
    Ok(())
}

// -- Scenario C: time-driven state machine ------------------------------------

#[tokio::test]
async fn payout_transitions_with_simulated_time() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    let resp = server.post("/v1/payouts").json(&json!({"amount": 5000})).await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    let payout: serde_json::Value = resp.json();
    assert_eq!(payout["id"], "po_000001");
    assert_eq!(payout["status"], "pending");

    let fetched: serde_json::Value = server.get("/v1/payouts/po_000001").await.json();
    assert_eq!(fetched["status"], "pending");

    server
        .post("/admin/time/advance")
        .json(&json!({"duration": "1h1s"}))
        .await
        .assert_status_ok();
    let fetched: serde_json::Value = server.get("/v1/payouts/po_000001").await.json();
    assert_eq!(fetched["status"], "in_transit");

    server.post("/admin/time/advance").json(&json!({"duration": "1h"})).await.assert_status_ok();
    let fetched: serde_json::Value = server.get("/v1/payouts/po_000001").await.json();
    assert_eq!(fetched["status"], "paid");
    Ok(())
}

// -- Scenario D: fault injection ----------------------------------------------

#[tokio::test]
async fn fault_rule_short_circuits_until_removed() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    server
        .post("/admin/fault/v1/contacts")
        .json(&json!({"status_code": 503, "rate": 1.0, "body": "{\"error\":\"twin on fire\"}"}))
        .await
        .assert_status_ok();

    let resp = server.post("/v1/contacts").json(&json!({"email": "a@b.c"})).await;
    resp.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"], "twin on fire");

    server.delete("/admin/fault/v1/contacts").await.assert_status_ok();

    let resp = server.post("/v1/contacts").json(&json!({"email": "a@b.c"})).await;
    resp.assert_status(axum::http::StatusCode::CREATED);
    Ok(())
}

// -- Scenario E: idempotency replay -------------------------------------------

#[tokio::test]
async fn idempotency_key_replays_creation() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    let first = server
        .post("/v1/contacts")
        .add_header("Idempotency-Key", "k1")
        .json(&json!({"email": "a@b.c"}))
        .await;
    first.assert_status(axum::http::StatusCode::CREATED);
    let first_body: serde_json::Value = first.json();
    assert_eq!(first_body["id"], "con_000001");

    let second = server
        .post("/v1/contacts")
        .add_header("Idempotency-Key", "k1")
        .json(&json!({"email": "a@b.c"}))
        .await;
    second.assert_status(axum::http::StatusCode::CREATED);
    let second_body: serde_json::Value = second.json();
    assert_eq!(second_body, first_body);
    assert_eq!(
        second
            .maybe_header("Idempotent-Replayed")
            .and_then(|v| v.to_str().ok().map(String::from)),
        Some("true".to_owned())
    );

    // The mutation ran exactly once.
    let list: serde_json::Value = server.get("/v1/contacts").await.json();
    assert_eq!(list["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

// -- Scenario F: webhook delivery + retry -------------------------------------

#[tokio::test]
async fn webhook_flush_retries_until_target_recovers() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    twin.kit.dispatcher.set_retry_delay(Duration::from_millis(10));
    let server = test_server(&twin);

    let (url, target) = CaptureTarget::spawn(&[500, 500, 200]).await?;
    twin.kit.dispatcher.set_url(&url);

    create_contact(&server, "a@b.c").await;

    server.post("/admin/webhooks/flush").await.assert_status_ok();

    assert_eq!(target.hit_count(), 3);
    let hits = target.hits.lock();
    assert_eq!(hits[0].body["type"], "contact.created");
    assert_eq!(hits[0].body["data"]["email"], "a@b.c");
    drop(hits);

    let deliveries: Vec<serde_json::Value> =
        server.get("/admin/webhooks/deliveries").await.json();
    assert_eq!(deliveries.len(), 3);
    let statuses: Vec<u64> =
        deliveries.iter().filter_map(|d| d["status"].as_u64()).collect();
    assert_eq!(statuses, vec![500, 500, 200]);
    assert!(deliveries.iter().all(|d| d["event_id"] == "evt_000001"));

    let queued: Vec<serde_json::Value> = server.get("/admin/webhooks/events").await.json();
    assert!(queued.is_empty());
    Ok(())
}

#[tokio::test]
async fn webhook_flush_surfaces_exhausted_retries_as_500() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    twin.kit.dispatcher.set_retry_delay(Duration::from_millis(10));
    let server = test_server(&twin);

    let (url, _target) = CaptureTarget::spawn(&[500, 500, 500]).await?;
    twin.kit.dispatcher.set_url(&url);

    create_contact(&server, "a@b.c").await;

    let resp = server.post("/admin/webhooks/flush").await;
    resp.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "INTERNAL");

    // History keeps every attempt even after the flush fails.
    let deliveries: Vec<serde_json::Value> =
        server.get("/admin/webhooks/deliveries").await.json();
    assert_eq!(deliveries.len(), 3);
    Ok(())
}

// -- Cross-cutting: seed via admin state --------------------------------------

#[tokio::test]
async fn admin_state_round_trip_preserves_records() -> anyhow::Result<()> {
    let twin = ContactsTwin::new();
    let server = test_server(&twin);

    create_contact(&server, "a@b.c").await;
    create_contact(&server, "d@e.f").await;
    server
        .post("/v1/payouts")
        .json(&json!({"amount": 100}))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let snapshot: serde_json::Value = server.get("/admin/state").await.json();
    server.post("/admin/reset").await.assert_status_ok();
    server.post("/admin/state").json(&snapshot).await.assert_status_ok();

    let list: serde_json::Value = server.get("/v1/contacts").await.json();
    assert_eq!(list["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(list["data"][0]["email"], "a@b.c");

    // Allocation continues past the loaded records.
    let next = create_contact(&server, "g@h.i").await;
    assert_eq!(next["id"], "con_000003");
    Ok(())
}
