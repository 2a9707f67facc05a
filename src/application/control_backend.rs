// Port for the fuzzy-controller backend
use crate::application::error::BackendError;
use crate::domain::control::{ControlInputs, ControlOutput};
use crate::domain::simulation::{SimulationPoint, SimulationSeries};
use crate::domain::telemetry::ConnectivityStatus;
use async_trait::async_trait;

#[async_trait]
pub trait ControlBackend: Send + Sync {
    /// Broker status as seen by the backend. Failures map to `connected = false`.
    async fn fetch_status(&self) -> ConnectivityStatus;

    /// Run one fuzzy inference pass on operator-supplied inputs
    async fn compute_manual(&self, inputs: &ControlInputs) -> Result<ControlOutput, BackendError>;

    /// Fetch a full-day discretized trace
    async fn fetch_simulation(&self) -> Result<SimulationSeries, BackendError>;

    /// Advance the backend's stepped simulation by one minute
    async fn fetch_step(&self) -> Result<SimulationPoint, BackendError>;

    async fn reset_step(&self) -> Result<(), BackendError>;
}
