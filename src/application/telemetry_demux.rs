// Telemetry demultiplexer - Classifies broker messages by topic suffix
use crate::domain::telemetry::TelemetryMessage;
use serde_json::{Map, Value};

const TEMP_SUFFIX: &str = "/temp";
const CONTROL_SUFFIX: &str = "/control";
const ALERT_SUFFIX: &str = "/alert";

/// Decode one inbound message. Anything that cannot be turned into a typed
/// sample yields `None`; malformed payloads are only traced.
pub fn parse_telemetry(topic: &str, payload: &[u8]) -> Option<TelemetryMessage> {
    let object = match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            tracing::debug!(topic, "Discarding non-object telemetry payload: {}", other);
            return None;
        }
        Err(e) => {
            tracing::debug!(
                topic,
                "Discarding unparseable telemetry payload ({}): {}",
                e,
                String::from_utf8_lossy(payload)
            );
            return None;
        }
    };

    if topic.ends_with(TEMP_SUFFIX) {
        finite_field(&object, "temp_atual").map(TelemetryMessage::Temperature)
    } else if topic.ends_with(CONTROL_SUFFIX) {
        finite_field(&object, "p_crac").map(TelemetryMessage::Power)
    } else if topic.ends_with(ALERT_SUFFIX) {
        let alert = match object.get("alert") {
            Some(Value::String(alert)) => alert.clone(),
            _ => Value::Object(object).to_string(),
        };
        Some(TelemetryMessage::Alert(alert))
    } else {
        tracing::debug!(topic, "Ignoring message on unhandled topic");
        None
    }
}

fn finite_field(object: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = object.get(key)?;
    match value.as_f64() {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            tracing::debug!("Dropping telemetry field {} with unusable value {}", key, value);
            None
        }
    }
}
