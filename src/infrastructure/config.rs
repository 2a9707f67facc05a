use serde::Deserialize;
use std::time::Duration;

const CONFIG_FILE: &str = "config/cooling";
const ENV_PREFIX: &str = "COOLING";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub backend: BackendSettings,
    pub broker: BrokerSettings,
    pub poller: PollerSettings,
    pub telemetry: TelemetrySettings,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerTransport {
    Tcp,
    Websocket,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub transport: BrokerTransport,
    pub ws_path: String,
    pub client_id: String,
    pub topic_filter: String,
    pub reconnect_period_ms: u64,
    pub connect_timeout_ms: u64,
    pub keep_alive_secs: u64,
}

impl BrokerSettings {
    pub fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_period_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Address handed to the MQTT client: bare host for TCP, full URL for WebSocket.
    pub fn broker_address(&self) -> String {
        match self.transport {
            BrokerTransport::Tcp => self.host.clone(),
            BrokerTransport::Websocket => {
                let path = self.ws_path.trim_start_matches('/');
                format!("ws://{}:{}/{}", self.host, self.port, path)
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerSettings {
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    pub history_capacity: usize,
    pub alert_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
}

/// Defaults, then `config/cooling.{toml,...}` if present, then `COOLING__*`
/// environment variables (e.g. `COOLING__BROKER__HOST`).
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = with_defaults(config::Config::builder())?
        .add_source(config::File::with_name(CONFIG_FILE).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    builder
        .set_default("backend.base_url", "http://localhost:8000")?
        .set_default("backend.request_timeout_ms", 10_000)?
        .set_default("broker.host", "test.mosquitto.org")?
        .set_default("broker.port", 8080)?
        .set_default("broker.transport", "websocket")?
        .set_default("broker.ws_path", "/mqtt")?
        .set_default("broker.client_id", "cooling-control-client")?
        .set_default("broker.topic_filter", "datacenter/fuzzy/#")?
        .set_default("broker.reconnect_period_ms", 3000)?
        .set_default("broker.connect_timeout_ms", 4000)?
        .set_default("broker.keep_alive_secs", 30)?
        .set_default("poller.interval_ms", 5000)?
        .set_default("telemetry.history_capacity", 600)?
        .set_default("telemetry.alert_capacity", 50)?
        .set_default("server.bind_addr", "127.0.0.1:8080")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Settings {
        with_defaults(config::Config::builder())
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let settings = defaults();

        assert_eq!(settings.broker.topic_filter, "datacenter/fuzzy/#");
        assert_eq!(settings.broker.reconnect_period(), Duration::from_millis(3000));
        assert_eq!(settings.broker.connect_timeout(), Duration::from_millis(4000));
        assert_eq!(settings.broker.transport, BrokerTransport::Websocket);
        assert_eq!(settings.poller.interval_ms, 5000);
        assert_eq!(settings.telemetry.history_capacity, 600);
        assert_eq!(settings.telemetry.alert_capacity, 50);
    }

    #[test]
    fn test_broker_address_per_transport() {
        let mut broker = defaults().broker;
        assert_eq!(broker.broker_address(), "ws://test.mosquitto.org:8080/mqtt");

        broker.transport = BrokerTransport::Tcp;
        assert_eq!(broker.broker_address(), "test.mosquitto.org");
    }

    #[test]
    fn test_file_values_override_defaults() {
        let settings: Settings = with_defaults(config::Config::builder())
            .unwrap()
            .add_source(config::File::from_str(
                "[broker]\nhost = \"localhost\"\nport = 1883\ntransport = \"tcp\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.broker.host, "localhost");
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.broker.transport, BrokerTransport::Tcp);
        assert_eq!(settings.backend.base_url, "http://localhost:8000");
    }
}
