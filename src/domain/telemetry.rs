// Telemetry domain models
use super::ring_buffer::{AlertLog, RingBuffer};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub seq: u64,
    pub received_at: DateTime<Utc>,
    pub value: f64,
}

/// A decoded broker message, ready to be applied to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryMessage {
    Temperature(f64),
    Power(f64),
    Alert(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryHistory {
    pub temperature: RingBuffer<TelemetrySample>,
    pub power: RingBuffer<TelemetrySample>,
    pub last_temperature: Option<f64>,
    pub last_power: Option<f64>,
    pub alerts: AlertLog,
    #[serde(skip)]
    next_seq: u64,
}

impl TelemetryHistory {
    pub fn new(history_capacity: usize, alert_capacity: usize) -> Self {
        Self {
            temperature: RingBuffer::new(history_capacity),
            power: RingBuffer::new(history_capacity),
            last_temperature: None,
            last_power: None,
            alerts: AlertLog::new(alert_capacity),
            next_seq: 0,
        }
    }

    pub(crate) fn apply(&mut self, message: TelemetryMessage, received_at: DateTime<Utc>) {
        match message {
            TelemetryMessage::Temperature(value) => {
                let sample = self.sample(value, received_at);
                self.temperature.append(sample);
                self.last_temperature = Some(value);
            }
            TelemetryMessage::Power(value) => {
                let sample = self.sample(value, received_at);
                self.power.append(sample);
                self.last_power = Some(value);
            }
            TelemetryMessage::Alert(alert) => self.alerts.push(alert),
        }
    }

    fn sample(&mut self, value: f64, received_at: DateTime<Utc>) -> TelemetrySample {
        let seq = self.next_seq;
        self.next_seq += 1;
        TelemetrySample {
            seq,
            received_at,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConnectivityStatus {
    pub connected: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ConnectivityStatus {
    pub fn checked_now(connected: bool) -> Self {
        Self {
            connected,
            last_checked: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_get_monotonic_sequence_across_series() {
        let mut history = TelemetryHistory::new(4, 4);
        let now = Utc::now();
        history.apply(TelemetryMessage::Temperature(21.0), now);
        history.apply(TelemetryMessage::Power(40.0), now);
        history.apply(TelemetryMessage::Temperature(21.5), now);

        let temps: Vec<u64> = history.temperature.iter().map(|s| s.seq).collect();
        assert_eq!(temps, vec![0, 2]);
        assert_eq!(history.power.latest().map(|s| s.seq), Some(1));
        assert_eq!(history.last_temperature, Some(21.5));
        assert_eq!(history.last_power, Some(40.0));
    }

    #[test]
    fn test_alert_does_not_touch_numeric_series() {
        let mut history = TelemetryHistory::new(4, 4);
        history.apply(TelemetryMessage::Alert("ALTA_TEMP".to_string()), Utc::now());

        assert!(history.temperature.is_empty());
        assert!(history.power.is_empty());
        assert_eq!(history.alerts.iter().collect::<Vec<_>>(), vec!["ALTA_TEMP"]);
    }
}
