// HTTP implementation of the fuzzy-controller backend
use crate::application::control_backend::ControlBackend;
use crate::application::error::BackendError;
use crate::domain::control::{ControlInputs, ControlOutput, MembershipPlots};
use crate::domain::simulation::{SimulationPoint, SimulationSeries};
use crate::domain::telemetry::ConnectivityStatus;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const STATUS_PATH: &str = "/v1/mqtt/status";
const MANUAL_PATH: &str = "/fuzzy/manual";
const SIMULATE_PATH: &str = "/v1/simulate-24h";
const STEP_PATH: &str = "/v1/step";
const RESET_PATH: &str = "/v1/reset";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    connected: bool,
}

#[derive(Debug, Serialize)]
struct ManualRequest {
    erro: f64,
    delta: f64,
    temp_externa: f64,
    carga_termica: f64,
}

impl From<&ControlInputs> for ManualRequest {
    fn from(inputs: &ControlInputs) -> Self {
        Self {
            erro: inputs.error,
            delta: inputs.delta_error,
            temp_externa: inputs.external_temp,
            carga_termica: inputs.thermal_load,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManualResponse {
    p_crac: f64,
    #[serde(default)]
    erro_plot: Option<String>,
    #[serde(default)]
    delta_plot: Option<String>,
    #[serde(default)]
    temp_plot: Option<String>,
    #[serde(default)]
    carga_plot: Option<String>,
    #[serde(default)]
    pcrac_plot: Option<String>,
    #[serde(default)]
    rules_plot: Option<String>,
}

impl From<ManualResponse> for ControlOutput {
    fn from(response: ManualResponse) -> Self {
        Self {
            crac_power: response.p_crac,
            plots: MembershipPlots {
                error: response.erro_plot,
                delta: response.delta_plot,
                external_temp: response.temp_plot,
                load: response.carga_plot,
                output: response.pcrac_plot,
                rules: response.rules_plot,
            },
        }
    }
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint,
                status,
                body,
            });
        }

        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        self.execute(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(|source| BackendError::Decode { endpoint, source })
    }
}

#[async_trait]
impl ControlBackend for HttpBackend {
    async fn fetch_status(&self) -> ConnectivityStatus {
        let request = self.request(Method::GET, STATUS_PATH);
        match self.execute_json::<StatusResponse>(STATUS_PATH, request).await {
            Ok(status) => ConnectivityStatus::checked_now(status.connected),
            Err(e) => {
                tracing::debug!("Status check failed, reporting disconnected: {}", e);
                ConnectivityStatus::checked_now(false)
            }
        }
    }

    async fn compute_manual(&self, inputs: &ControlInputs) -> Result<ControlOutput, BackendError> {
        let request = self
            .request(Method::POST, MANUAL_PATH)
            .json(&ManualRequest::from(inputs));
        let response: ManualResponse = self.execute_json(MANUAL_PATH, request).await?;
        Ok(response.into())
    }

    async fn fetch_simulation(&self) -> Result<SimulationSeries, BackendError> {
        let request = self.request(Method::GET, SIMULATE_PATH);
        self.execute_json(SIMULATE_PATH, request).await
    }

    async fn fetch_step(&self) -> Result<SimulationPoint, BackendError> {
        let request = self.request(Method::GET, STEP_PATH);
        self.execute_json(STEP_PATH, request).await
    }

    async fn reset_step(&self) -> Result<(), BackendError> {
        let request = self.request(Method::POST, RESET_PATH);
        self.execute(RESET_PATH, request).await?;
        Ok(())
    }
}
