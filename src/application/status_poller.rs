// Status poller - Periodic backend health checks
use crate::application::control_backend::ControlBackend;
use crate::application::control_store::ControlStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

pub struct StatusPoller {
    backend: Arc<dyn ControlBackend>,
    store: ControlStore,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn ControlBackend>, store: ControlStore, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Fires immediately, then every `interval`. Each tick runs its own fetch
    /// so a slow response never delays the next check.
    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Status poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let backend = self.backend.clone();
                    let store = self.store.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        poll_once(backend.as_ref(), &store, &shutdown).await;
                    });
                }
            }
        }

        tracing::info!("Status poller stopped");
    }
}

/// One status round-trip. Results are written in completion order, so a slow
/// response can overwrite a newer one that finished first.
pub async fn poll_once(
    backend: &dyn ControlBackend,
    store: &ControlStore,
    shutdown: &CancellationToken,
) {
    let status = backend.fetch_status().await;
    if shutdown.is_cancelled() {
        tracing::debug!("Discarding status result received after shutdown");
        return;
    }
    store.set_connectivity(status);
}
