// Main entry point - Dependency injection and lifecycle
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::application::control_backend::ControlBackend;
use crate::application::control_store::{ControlState, ControlStore};
use crate::application::status_poller::StatusPoller;
use crate::application::telemetry_demux::parse_telemetry;
use crate::infrastructure::broker_adapter::BrokerAdapter;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::http_backend::HttpBackend;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = load_settings().context("Failed to load configuration")?;

    // Backend client (infrastructure layer)
    let backend: Arc<dyn ControlBackend> = Arc::new(
        HttpBackend::new(
            &settings.backend.base_url,
            Duration::from_millis(settings.backend.request_timeout_ms),
        )
        .context("Failed to build HTTP client")?,
    );

    // Store (application layer)
    let store = ControlStore::new(
        backend.clone(),
        ControlState::new(
            settings.telemetry.history_capacity,
            settings.telemetry.alert_capacity,
        ),
    );

    // Poller and broker share one shutdown token
    let shutdown = CancellationToken::new();

    let poller = StatusPoller::new(
        backend.clone(),
        store.clone(),
        Duration::from_millis(settings.poller.interval_ms),
    )
    .spawn(shutdown.clone());

    let mut broker = BrokerAdapter::new(settings.broker.clone());
    broker.on_message({
        let store = store.clone();
        move |topic, payload| {
            if let Some(message) = parse_telemetry(topic, payload) {
                store.apply_telemetry(message);
            }
        }
    });
    let mut broker_state = broker.watch_state();
    let broker_mirror = tokio::spawn({
        let store = store.clone();
        async move {
            loop {
                let current = *broker_state.borrow_and_update();
                store.set_broker_state(current);
                if broker_state.changed().await.is_err() {
                    break;
                }
            }
        }
    });
    let broker = broker.spawn(shutdown.clone());

    // Operator API (presentation layer)
    let router = handlers::router(Arc::new(AppState {
        store: store.clone(),
        shutdown: shutdown.clone(),
    }));
    let addr: SocketAddr = settings
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", settings.server.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, backend = %settings.backend.base_url, "Starting cooling control client");

    axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutting down");
                shutdown.cancel();
            }
        })
        .await?;

    // Dispose: stop the poller timer and close the broker connection
    shutdown.cancel();
    join_logged("status poller", poller).await;
    join_logged("broker adapter", broker).await;
    join_logged("broker state mirror", broker_mirror).await;

    Ok(())
}

/// Wait for a background task, logging instead of swallowing a panic.
async fn join_logged(task: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task, "Background task failed: {}", e);
            false
        }
    }
}
