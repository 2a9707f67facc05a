// HTTP request handlers for the operator UI
use crate::application::control_store::ControlState;
use crate::application::error::ControlError;
use crate::domain::control::InputField;
use crate::domain::telemetry::ConnectivityStatus;
use crate::presentation::app_state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post, put},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct InputValue {
    pub value: f64,
}

#[derive(Serialize)]
pub struct InputFieldInfo {
    pub field: InputField,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlError::AlreadyExecuting => StatusCode::CONFLICT,
            ControlError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/state", get(get_state))
        .route("/state/stream", get(stream_state))
        .route("/alerts/stream", get(stream_alerts))
        .route("/inputs", get(list_inputs))
        .route("/inputs/reset", post(reset_inputs))
        .route("/inputs/:field", put(set_input))
        .route("/status/refresh", post(refresh_status))
        .route("/compute", post(execute_compute))
        .route("/simulation", post(run_simulation))
        .route("/step", post(advance_step))
        .route("/step/reset", post(reset_step))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<ControlState> {
    Json(state.store.snapshot())
}

/// Push the full state on every store write, starting with the current one.
pub async fn stream_state(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut updates = WatchStream::new(state.store.subscribe());
    let stream = async_stream::stream! {
        while let Some(snapshot) = updates.next().await {
            match Event::default().event("state").json_data(&snapshot) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!("Failed to encode state event: {}", e),
            }
        }
    };
    Sse::new(stream.take_until(state.shutdown.clone().cancelled_owned()))
        .keep_alive(KeepAlive::default())
}

/// Alert log only, re-sent whenever a new alert arrives. Keyed on the push
/// count so a repeated alert on a full log is still delivered.
pub async fn stream_alerts(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut alerts = state.store.project(|s| {
        let log = &s.telemetry.alerts;
        (log.total_pushed(), log.iter().map(str::to_owned).collect::<Vec<_>>())
    });
    let stream = async_stream::stream! {
        let mut current = Some(alerts.get().clone());
        while let Some((_, list)) = current {
            match Event::default().event("alerts").json_data(&list) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!("Failed to encode alert event: {}", e),
            }
            current = alerts.changed().await;
        }
    };
    Sse::new(stream.take_until(state.shutdown.clone().cancelled_owned()))
        .keep_alive(KeepAlive::default())
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<ConnectivityStatus> {
    Json(state.store.refresh_status().await)
}

/// Current inputs with the operating range the UI should enforce.
pub async fn list_inputs(State(state): State<Arc<AppState>>) -> Json<Vec<InputFieldInfo>> {
    let inputs = state.store.snapshot().inputs;
    let fields = InputField::ALL
        .into_iter()
        .map(|field| {
            let range = field.range();
            InputFieldInfo {
                field,
                unit: field.unit(),
                min: *range.start(),
                max: *range.end(),
                value: inputs.get(field),
            }
        })
        .collect();
    Json(fields)
}

pub async fn set_input(
    Path(field): Path<InputField>,
    State(state): State<Arc<AppState>>,
    Json(input): Json<InputValue>,
) -> StatusCode {
    if state.store.set_input(field, input.value) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

pub async fn reset_inputs(State(state): State<Arc<AppState>>) -> StatusCode {
    state.store.reset_inputs();
    StatusCode::NO_CONTENT
}

pub async fn execute_compute(State(state): State<Arc<AppState>>) -> Response {
    match state.store.execute_manual_compute().await {
        Ok(output) => Json(output).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn run_simulation(State(state): State<Arc<AppState>>) -> Response {
    match state.store.run_simulation().await {
        Ok(series) => Json(series).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn advance_step(State(state): State<Arc<AppState>>) -> Response {
    match state.store.advance_step().await {
        Ok(point) => Json(point).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn reset_step(State(state): State<Arc<AppState>>) -> Response {
    match state.store.reset_step().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::control_backend::ControlBackend;
    use crate::application::control_store::ControlStore;
    use crate::application::error::BackendError;
    use crate::domain::control::{ControlInputs, ControlOutput};
    use crate::domain::ring_buffer::DEFAULT_HISTORY_CAPACITY;
    use crate::domain::simulation::{SimulationPoint, SimulationSeries};
    use crate::domain::telemetry::TelemetryMessage;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    /// Backend that is always down.
    struct Offline;

    fn offline(endpoint: &'static str) -> BackendError {
        BackendError::Status {
            endpoint,
            status: 502,
            body: String::new(),
        }
    }

    #[async_trait]
    impl ControlBackend for Offline {
        async fn fetch_status(&self) -> ConnectivityStatus {
            ConnectivityStatus::checked_now(false)
        }

        async fn compute_manual(&self, _: &ControlInputs) -> Result<ControlOutput, BackendError> {
            Err(offline("/fuzzy/manual"))
        }

        async fn fetch_simulation(&self) -> Result<SimulationSeries, BackendError> {
            Err(offline("/v1/simulate-24h"))
        }

        async fn fetch_step(&self) -> Result<SimulationPoint, BackendError> {
            Err(offline("/v1/step"))
        }

        async fn reset_step(&self) -> Result<(), BackendError> {
            Err(offline("/v1/reset"))
        }
    }

    struct TestApp {
        base: String,
        store: ControlStore,
        shutdown: CancellationToken,
        server: JoinHandle<()>,
    }

    async fn serve() -> TestApp {
        serve_with(ControlState::default()).await
    }

    async fn serve_with(initial: ControlState) -> TestApp {
        let store = ControlStore::new(Arc::new(Offline), initial);
        let shutdown = CancellationToken::new();
        let app = router(Arc::new(AppState {
            store: store.clone(),
            shutdown: shutdown.clone(),
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown.cancelled_owned())
                    .await
                    .unwrap();
            }
        });
        TestApp {
            base: format!("http://{}", addr),
            store,
            shutdown,
            server,
        }
    }

    /// Reads `event:`/`data:` blocks off a streaming response.
    struct SseReader {
        response: reqwest::Response,
        buffer: String,
    }

    impl SseReader {
        async fn open(url: String) -> Self {
            let response = reqwest::get(url).await.unwrap();
            assert_eq!(response.status(), 200);
            Self {
                response,
                buffer: String::new(),
            }
        }

        async fn next_event(&mut self) -> (String, Value) {
            tokio::time::timeout(Duration::from_secs(2), async {
                loop {
                    if let Some(end) = self.buffer.find("\n\n") {
                        let block: String = self.buffer.drain(..end + 2).collect();
                        let mut name = String::new();
                        let mut data = String::new();
                        for line in block.lines() {
                            if let Some(value) = line.strip_prefix("event:") {
                                name = value.trim().to_string();
                            } else if let Some(value) = line.strip_prefix("data:") {
                                data.push_str(value.trim_start());
                            }
                        }
                        if data.is_empty() {
                            continue;
                        }
                        return (name, serde_json::from_str(&data).unwrap());
                    }
                    let chunk = self.response.chunk().await.unwrap().expect("stream ended");
                    self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
                }
            })
            .await
            .expect("no SSE event within 2s")
        }
    }

    #[tokio::test]
    async fn test_input_write_and_reset() {
        let app = serve().await;
        let client = reqwest::Client::new();

        let response = client
            .put(format!("{}/inputs/thermal_load", app.base))
            .json(&json!({"value": 72.5}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(app.store.snapshot().inputs.thermal_load, 72.5);

        let state: Value = client
            .get(format!("{}/state", app.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["inputs"]["thermal_load"], json!(72.5));
        assert_eq!(state["broker"], json!("disconnected"));

        let response = client
            .post(format!("{}/inputs/reset", app.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(app.store.snapshot().inputs, ControlInputs::default());
    }

    #[tokio::test]
    async fn test_input_metadata_lists_ranges() {
        let app = serve().await;
        let fields: Value = reqwest::get(format!("{}/inputs", app.base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            fields[0],
            json!({"field": "error", "unit": "°C", "min": -15.0, "max": 15.0, "value": 0.0})
        );
        assert_eq!(fields[3]["field"], json!("thermal_load"));
        assert_eq!(fields[3]["value"], json!(40.0));
    }

    #[tokio::test]
    async fn test_unknown_input_field_is_rejected() {
        let app = serve().await;
        let response = reqwest::Client::new()
            .put(format!("{}/inputs/humidity", app.base))
            .json(&json!({"value": 1.0}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_backend_failures_map_to_service_unavailable() {
        let app = serve().await;
        let client = reqwest::Client::new();

        for path in ["/compute", "/simulation", "/step", "/step/reset"] {
            let response = client
                .post(format!("{}{}", app.base, path))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 503, "{}", path);
        }
        assert!(!app.store.snapshot().is_executing);
    }

    #[tokio::test]
    async fn test_status_refresh_checks_backend_now() {
        let app = serve().await;
        let status: Value = reqwest::Client::new()
            .post(format!("{}/status/refresh", app.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(status["connected"], json!(false));
        assert!(status["last_checked"].is_string());
        assert!(app.store.snapshot().connectivity.last_checked.is_some());
    }

    #[tokio::test]
    async fn test_state_stream_sends_current_then_each_write() {
        let app = serve().await;
        let mut events = SseReader::open(format!("{}/state/stream", app.base)).await;

        let (name, first) = events.next_event().await;
        assert_eq!(name, "state");
        assert_eq!(first["inputs"]["thermal_load"], json!(40.0));

        app.store.set_input(InputField::ThermalLoad, 61.0);

        let (name, next) = events.next_event().await;
        assert_eq!(name, "state");
        assert_eq!(next["inputs"]["thermal_load"], json!(61.0));
    }

    #[tokio::test]
    async fn test_alert_stream_delivers_repeated_alert_on_full_log() {
        let app = serve_with(ControlState::new(DEFAULT_HISTORY_CAPACITY, 2)).await;
        let alert = || TelemetryMessage::Alert("POTENCIA_PROLONGADA minutos=30".to_string());
        app.store.apply_telemetry(alert());
        app.store.apply_telemetry(alert());
        let mut events = SseReader::open(format!("{}/alerts/stream", app.base)).await;

        let (name, first) = events.next_event().await;
        assert_eq!(name, "alerts");
        assert_eq!(first, json!(["POTENCIA_PROLONGADA minutos=30", "POTENCIA_PROLONGADA minutos=30"]));

        app.store.set_input(InputField::Error, 3.0);
        app.store.apply_telemetry(alert());

        let (name, next) = events.next_event().await;
        assert_eq!(name, "alerts");
        assert_eq!(next, first);
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_streams() {
        let app = serve().await;
        let mut state_events = SseReader::open(format!("{}/state/stream", app.base)).await;
        let mut alert_events = SseReader::open(format!("{}/alerts/stream", app.base)).await;
        state_events.next_event().await;
        alert_events.next_event().await;

        app.shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(3), app.server)
            .await
            .expect("server should finish with stream clients attached")
            .unwrap();
    }
}
