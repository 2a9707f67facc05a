// Application state for HTTP handlers
use crate::application::control_store::ControlStore;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub store: ControlStore,
    /// Ends long-lived streams so graceful shutdown can finish.
    pub shutdown: CancellationToken,
}
