// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twin server shell: router assembly, startup wiring, graceful shutdown.

use std::path::Path;
use std::sync::Arc;
use std::sync::Once;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::admin::{admin_router, AdminState, StateStore};
use crate::config::{TwinConfig, LATENCY_MS_KEY};
use crate::middleware;
use crate::TwinKit;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Initialize tracing for a twin binary. `RUST_LOG` wins; otherwise
/// `--verbose` selects debug over info.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

/// Load a JSON seed snapshot from disk into the state store.
pub fn load_seed_file(path: &Path, store: &dyn StateStore) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let snapshot: serde_json::Value = serde_json::from_str(&contents)?;
    store.load_state(&snapshot)?;
    tracing::info!(path = %path.display(), "seed snapshot loaded");
    Ok(())
}

/// Assemble the full twin router: the API router wrapped in the middleware
/// stack, merged with the admin plane, behind permissive CORS.
pub fn build_router(api: Router, kit: &Arc<TwinKit>, store: Arc<dyn StateStore>) -> Router {
    let admin = AdminState::new(kit, store);
    middleware::apply(api, Arc::clone(kit))
        .merge(admin_router(admin))
        .layer(CorsLayer::permissive())
}

/// Run a twin until shutdown.
///
/// Applies startup flags to the kit, loads the seed file if given, binds,
/// and serves until SIGINT or the kit's cancellation token fires.
pub async fn serve(
    config: TwinConfig,
    name: &str,
    api: Router,
    kit: Arc<TwinKit>,
    store: Arc<dyn StateStore>,
) -> anyhow::Result<()> {
    ensure_crypto();

    if let Some(ref url) = config.webhook_url {
        kit.dispatcher.set_url(url);
    }
    if config.latency_ms > 0 {
        kit.runtime.set(LATENCY_MS_KEY, serde_json::json!(config.latency_ms));
    }
    if let Some(ref path) = config.seed_file {
        load_seed_file(path, store.as_ref())?;
    }

    let router = build_router(api, &kit, store);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(twin = %name, "listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(kit.shutdown.clone()))
        .await?;
    tracing::info!(twin = %name, "shut down");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if result.is_err() {
                // Signal handler unavailable; fall back to the token.
                token.cancelled().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
