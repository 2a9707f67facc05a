// Control state store - Single source of truth for inputs, outputs and telemetry
use crate::application::control_backend::ControlBackend;
use crate::application::error::ControlError;
use crate::domain::control::{ControlInputs, ControlOutput, InputField};
use crate::domain::ring_buffer::{DEFAULT_ALERT_CAPACITY, DEFAULT_HISTORY_CAPACITY};
use crate::domain::simulation::{SimulationPoint, SimulationSeries};
use crate::domain::telemetry::{
    BrokerConnectionState, ConnectivityStatus, TelemetryHistory, TelemetryMessage,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub inputs: ControlInputs,
    pub output: ControlOutput,
    pub is_executing: bool,
    pub simulations_in_flight: u32,
    pub simulation: SimulationSeries,
    pub last_step: Option<SimulationPoint>,
    pub connectivity: ConnectivityStatus,
    pub broker: BrokerConnectionState,
    pub telemetry: TelemetryHistory,
}

impl ControlState {
    pub fn new(history_capacity: usize, alert_capacity: usize) -> Self {
        Self {
            inputs: ControlInputs::default(),
            output: ControlOutput::default(),
            is_executing: false,
            simulations_in_flight: 0,
            simulation: Vec::new(),
            last_step: None,
            connectivity: ConnectivityStatus::default(),
            broker: BrokerConnectionState::default(),
            telemetry: TelemetryHistory::new(history_capacity, alert_capacity),
        }
    }

    pub fn is_simulating(&self) -> bool {
        self.simulations_in_flight > 0
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_ALERT_CAPACITY)
    }
}

/// Cloneable handle to the process-wide state.
///
/// Every write goes through `watch::Sender::send_modify`, so each write is
/// applied as one step and subscribers see the new value as soon as the
/// writer returns. Each field has exactly one writer method below.
#[derive(Clone)]
pub struct ControlStore {
    state: Arc<watch::Sender<ControlState>>,
    backend: Arc<dyn ControlBackend>,
}

impl ControlStore {
    pub fn new(backend: Arc<dyn ControlBackend>, initial: ControlState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            state: Arc::new(tx),
            backend,
        }
    }

    pub fn snapshot(&self) -> ControlState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.state.subscribe()
    }

    /// Subscribe to a slice of the state; wakes only when the slice changes.
    pub fn project<T, F>(&self, select: F) -> Projection<T, F>
    where
        T: Clone + PartialEq,
        F: Fn(&ControlState) -> T,
    {
        let rx = self.state.subscribe();
        let current = select(&*rx.borrow());
        Projection {
            rx,
            select,
            current,
        }
    }

    /// Store a finite value as-is. Non-finite values are dropped.
    pub fn set_input(&self, field: InputField, value: f64) -> bool {
        if !value.is_finite() {
            tracing::debug!(%field, value, "Ignoring non-finite input");
            return false;
        }
        self.state.send_modify(|s| s.inputs.set(field, value));
        true
    }

    pub fn reset_inputs(&self) {
        self.state
            .send_modify(|s| s.inputs = ControlInputs::default());
    }

    /// Run a fuzzy inference pass on the current inputs.
    ///
    /// The previous output is only replaced on success. `is_executing` is
    /// cleared when this future completes or is dropped.
    pub async fn execute_manual_compute(&self) -> Result<ControlOutput, ControlError> {
        let mut claimed = None;
        self.state.send_if_modified(|s| {
            if s.is_executing {
                return false;
            }
            s.is_executing = true;
            claimed = Some(s.inputs);
            true
        });
        let inputs = claimed.ok_or(ControlError::AlreadyExecuting)?;
        let _executing = ExecutingGuard { state: &self.state };

        tracing::info!(?inputs, "Executing manual fuzzy compute");
        match self.backend.compute_manual(&inputs).await {
            Ok(output) => {
                tracing::info!(crac_power = output.crac_power, "Manual compute finished");
                self.state.send_modify(|s| s.output = output.clone());
                Ok(output)
            }
            Err(e) => {
                tracing::warn!("Manual compute failed, keeping previous output: {}", e);
                Err(e.into())
            }
        }
    }

    /// Fetch the 24h trace. Concurrent runs are not serialized; the series
    /// from whichever run completes last is kept.
    pub async fn run_simulation(&self) -> Result<SimulationSeries, ControlError> {
        self.state.send_modify(|s| {
            if s.is_simulating() {
                tracing::debug!(in_flight = s.simulations_in_flight, "Starting overlapping simulation run");
            }
            s.simulations_in_flight += 1;
        });
        let _loading = SimulatingGuard { state: &self.state };

        match self.backend.fetch_simulation().await {
            Ok(series) => {
                tracing::info!(points = series.len(), "Loaded 24h simulation");
                self.state.send_modify(|s| s.simulation = series.clone());
                Ok(series)
            }
            Err(e) => {
                tracing::warn!("24h simulation failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub async fn advance_step(&self) -> Result<SimulationPoint, ControlError> {
        let point = self.backend.fetch_step().await.inspect_err(|e| {
            tracing::warn!("Step request failed: {}", e);
        })?;
        self.state.send_modify(|s| s.last_step = Some(point));
        Ok(point)
    }

    pub async fn reset_step(&self) -> Result<(), ControlError> {
        self.backend.reset_step().await?;
        self.state.send_modify(|s| s.last_step = None);
        Ok(())
    }

    /// Check backend status now instead of waiting for the next poll tick.
    pub async fn refresh_status(&self) -> ConnectivityStatus {
        let status = self.backend.fetch_status().await;
        self.set_connectivity(status);
        status
    }

    pub fn apply_telemetry(&self, message: TelemetryMessage) {
        let received_at = Utc::now();
        self.state
            .send_modify(|s| s.telemetry.apply(message, received_at));
    }

    pub fn set_connectivity(&self, status: ConnectivityStatus) {
        self.state.send_modify(|s| {
            if s.connectivity.connected != status.connected {
                tracing::info!(connected = status.connected, "Backend broker status changed");
            }
            s.connectivity = status;
        });
    }

    pub fn set_broker_state(&self, broker: BrokerConnectionState) {
        self.state.send_if_modified(|s| {
            let changed = s.broker != broker;
            s.broker = broker;
            changed
        });
    }
}

struct ExecutingGuard<'a> {
    state: &'a watch::Sender<ControlState>,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_executing = false);
    }
}

struct SimulatingGuard<'a> {
    state: &'a watch::Sender<ControlState>,
}

impl Drop for SimulatingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.simulations_in_flight = s.simulations_in_flight.saturating_sub(1));
    }
}

/// Receiver for a projection of the store state.
pub struct Projection<T, F> {
    rx: watch::Receiver<ControlState>,
    select: F,
    current: T,
}

impl<T, F> Projection<T, F>
where
    T: Clone + PartialEq,
    F: Fn(&ControlState) -> T,
{
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Wait for the projected value to change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let next = {
                let state = self.rx.borrow_and_update();
                (self.select)(&*state)
            };
            if next != self.current {
                self.current = next.clone();
                return Some(next);
            }
        }
    }
}
