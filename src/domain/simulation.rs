// 24h simulation trace as produced by the backend

use serde::{Deserialize, Serialize};

/// One simulated minute. Wire names follow the backend payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationPoint {
    #[serde(rename = "minuto")]
    pub minute: i64,
    #[serde(rename = "temp_atual")]
    pub temp_actual: f64,
    pub p_crac: f64,
    #[serde(rename = "temp_externa")]
    pub temp_external: f64,
    #[serde(rename = "carga_termica")]
    pub thermal_load: f64,
    #[serde(rename = "erro", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

pub type SimulationSeries = Vec<SimulationPoint>;
