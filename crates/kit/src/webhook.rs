// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook dispatcher: queues events, signs payloads with a pluggable
//! signer, delivers via POST with bounded retries, and records every attempt.
//!
//! Delivery failures never surface to the API request that enqueued the
//! event; they are visible only through the delivery history and the admin
//! webhook endpoints.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Computes signing headers for an outgoing delivery.
///
/// Vendor twins provide their own implementations (e.g. Stripe's
/// `t=…,v1=…` HMAC header). With no signer configured the payload is
/// delivered unsigned.
pub trait Signer: Send + Sync {
    fn sign(&self, payload: &[u8], secret: &str) -> Vec<(String, String)>;
}

/// A queued webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created: i64,
    pub data: serde_json::Value,
}

/// Record of one attempt to POST an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub event_id: String,
    pub url: String,
    pub attempt: u32,
    /// HTTP status of the attempt; 0 on network error.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

struct Inner {
    counter: u64,
    queue: Vec<Event>,
    history: Vec<Event>,
    deliveries: Vec<Delivery>,
    url: Option<String>,
    secret: String,
    auto_deliver: bool,
    max_retries: u32,
    retry_delay: Duration,
}

struct Shared {
    prefix: String,
    clock: Arc<Clock>,
    client: Client,
    signer: RwLock<Option<Arc<dyn Signer>>>,
    inner: Mutex<Inner>,
}

/// Event queue + signer + delivery engine for one twin.
///
/// Cheap to clone; clones share the same queue and history.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(prefix: impl Into<String>, clock: Arc<Clock>) -> Self {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self {
            shared: Arc::new(Shared {
                prefix: prefix.into(),
                clock,
                client,
                signer: RwLock::new(None),
                inner: Mutex::new(Inner {
                    counter: 0,
                    queue: Vec::new(),
                    history: Vec::new(),
                    deliveries: Vec::new(),
                    url: None,
                    secret: String::new(),
                    auto_deliver: false,
                    max_retries: DEFAULT_MAX_RETRIES,
                    retry_delay: DEFAULT_RETRY_DELAY,
                }),
            }),
        }
    }

    // -- Configuration --------------------------------------------------------

    pub fn set_url(&self, url: impl Into<String>) {
        self.shared.inner.lock().url = Some(url.into());
    }

    pub fn clear_url(&self) {
        self.shared.inner.lock().url = None;
    }

    pub fn set_secret(&self, secret: impl Into<String>) {
        self.shared.inner.lock().secret = secret.into();
    }

    pub fn set_signer(&self, signer: Arc<dyn Signer>) {
        *self.shared.signer.write() = Some(signer);
    }

    /// When enabled, every enqueue spawns an independent delivery task.
    /// Ordering across events is not guaranteed; flush explicitly if it
    /// matters.
    pub fn set_auto_deliver(&self, enabled: bool) {
        self.shared.inner.lock().auto_deliver = enabled;
    }

    pub fn set_max_retries(&self, max_retries: u32) {
        self.shared.inner.lock().max_retries = max_retries.max(1);
    }

    pub fn set_retry_delay(&self, delay: Duration) {
        self.shared.inner.lock().retry_delay = delay;
    }

    // -- Queue ----------------------------------------------------------------

    /// Allocate an event, append it to the queue, and (under auto-deliver
    /// with a URL configured) schedule asynchronous delivery.
    pub fn enqueue(&self, kind: impl Into<String>, data: serde_json::Value) -> Event {
        let (event, auto, url) = {
            let mut inner = self.shared.inner.lock();
            inner.counter += 1;
            let event = Event {
                id: format!("{}_{:06}", self.shared.prefix, inner.counter),
                kind: kind.into(),
                created: self.shared.clock.now_unix(),
                data,
            };
            inner.queue.push(event.clone());
            inner.history.push(event.clone());
            (event, inner.auto_deliver, inner.url.clone())
        };

        if auto {
            if let Some(url) = url {
                let dispatcher = self.clone();
                let queued = event.clone();
                tokio::spawn(async move {
                    if dispatcher.deliver(&queued, &url).await.is_ok() {
                        dispatcher.remove_queued(&queued.id);
                    }
                });
            }
        }

        tracing::debug!(event_id = %event.id, kind = %event.kind, "event enqueued");
        event
    }

    /// Deliver every queued event synchronously, in enqueue order, one at a
    /// time. The queue is cleared when the call returns regardless of
    /// per-event failures; the last error seen (if any) is returned.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (events, url) = {
            let mut inner = self.shared.inner.lock();
            (std::mem::take(&mut inner.queue), inner.url.clone())
        };

        let Some(url) = url else {
            if !events.is_empty() {
                tracing::info!(
                    count = events.len(),
                    "webhook flush skipped: no delivery url configured"
                );
            }
            return Ok(());
        };

        let mut last_err = None;
        for event in &events {
            if let Err(e) = self.deliver(event, &url).await {
                tracing::warn!(event_id = %event.id, err = %e, "webhook delivery failed");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn queued_events(&self) -> Vec<Event> {
        self.shared.inner.lock().queue.clone()
    }

    pub fn all_events(&self) -> Vec<Event> {
        self.shared.inner.lock().history.clone()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.shared.inner.lock().deliveries.clone()
    }

    /// Clear queue, history, delivery records, and the event counter.
    /// Delivery configuration (URL, secret, signer) is kept.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.queue.clear();
        inner.history.clear();
        inner.deliveries.clear();
        inner.counter = 0;
    }

    // -- Delivery -------------------------------------------------------------

    /// POST one event with bounded retries. Success is any 2xx status.
    async fn deliver(&self, event: &Event, url: &str) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        let signer = self.shared.signer.read().clone();
        let (secret, max_retries, retry_delay) = {
            let inner = self.shared.inner.lock();
            (inner.secret.clone(), inner.max_retries, inner.retry_delay)
        };

        let mut last_err = anyhow::anyhow!("delivery not attempted");
        for attempt in 1..=max_retries {
            let mut req = self
                .shared
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload.clone());
            if let Some(ref signer) = signer {
                for (name, value) in signer.sign(&payload, &secret) {
                    req = req.header(name, value);
                }
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    self.record_delivery(event, url, attempt, status, None);
                    if resp.status().is_success() {
                        tracing::debug!(event_id = %event.id, attempt, "webhook delivered");
                        return Ok(());
                    }
                    last_err = anyhow::anyhow!("webhook target returned status {status}");
                }
                Err(e) => {
                    self.record_delivery(event, url, attempt, 0, Some(e.to_string()));
                    last_err = anyhow::anyhow!("webhook request failed: {e}");
                }
            }

            if attempt < max_retries {
                tokio::time::sleep(retry_delay).await;
            }
        }
        Err(last_err)
    }

    fn record_delivery(
        &self,
        event: &Event,
        url: &str,
        attempt: u32,
        status: u16,
        error: Option<String>,
    ) {
        self.shared.inner.lock().deliveries.push(Delivery {
            event_id: event.id.clone(),
            url: url.to_owned(),
            attempt,
            status,
            error,
            timestamp: self.shared.clock.now_unix(),
        });
    }

    fn remove_queued(&self, event_id: &str) {
        self.shared.inner.lock().queue.retain(|e| e.id != event_id);
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
