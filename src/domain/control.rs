// Controller inputs and the result of a manual fuzzy compute
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Error,
    DeltaError,
    ExternalTemp,
    ThermalLoad,
}

impl InputField {
    pub const ALL: [InputField; 4] = [
        InputField::Error,
        InputField::DeltaError,
        InputField::ExternalTemp,
        InputField::ThermalLoad,
    ];

    /// Operating range the UI is expected to enforce. Not checked by the store.
    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            InputField::Error => -15.0..=15.0,
            InputField::DeltaError => -5.0..=5.0,
            InputField::ExternalTemp => 0.0..=35.0,
            InputField::ThermalLoad => 0.0..=100.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            InputField::Error | InputField::ExternalTemp => "°C",
            InputField::DeltaError => "°C/min",
            InputField::ThermalLoad => "%",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputField::Error => "error",
            InputField::DeltaError => "delta_error",
            InputField::ExternalTemp => "external_temp",
            InputField::ThermalLoad => "thermal_load",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlInputs {
    pub error: f64,
    pub delta_error: f64,
    pub external_temp: f64,
    pub thermal_load: f64,
}

impl ControlInputs {
    pub fn get(&self, field: InputField) -> f64 {
        match field {
            InputField::Error => self.error,
            InputField::DeltaError => self.delta_error,
            InputField::ExternalTemp => self.external_temp,
            InputField::ThermalLoad => self.thermal_load,
        }
    }

    pub(crate) fn set(&mut self, field: InputField, value: f64) {
        let slot = match field {
            InputField::Error => &mut self.error,
            InputField::DeltaError => &mut self.delta_error,
            InputField::ExternalTemp => &mut self.external_temp,
            InputField::ThermalLoad => &mut self.thermal_load,
        };
        *slot = value;
    }
}

impl Default for ControlInputs {
    fn default() -> Self {
        Self {
            error: 0.0,
            delta_error: 0.0,
            external_temp: 25.0,
            thermal_load: 40.0,
        }
    }
}

/// Base64-encoded PNG membership plots returned alongside a manual compute.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MembershipPlots {
    pub error: Option<String>,
    pub delta: Option<String>,
    pub external_temp: Option<String>,
    pub load: Option<String>,
    pub output: Option<String>,
    pub rules: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlOutput {
    pub crac_power: f64,
    pub plots: MembershipPlots,
}
