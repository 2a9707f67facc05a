// MQTT broker adapter - Persistent subscription with reconnect-after-backoff
use crate::domain::telemetry::BrokerConnectionState;
use crate::infrastructure::config::{BrokerSettings, BrokerTransport};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode, Transport,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REQUEST_CAPACITY: usize = 16;
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

pub type MessageHandler = Box<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Why a broker session ended.
#[derive(Debug)]
enum SessionEnd {
    ConnectTimeout,
    Transport(ConnectionError),
}

pub struct BrokerAdapter {
    settings: BrokerSettings,
    handlers: Vec<MessageHandler>,
    state: watch::Sender<BrokerConnectionState>,
}

impl BrokerAdapter {
    pub fn new(settings: BrokerSettings) -> Self {
        let (state, _) = watch::channel(BrokerConnectionState::Disconnected);
        Self {
            settings,
            handlers: Vec::new(),
            state,
        }
    }

    /// Register a handler for every message under the topic filter.
    /// Handlers receive the topic and the raw payload, unmodified.
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn connection_state(&self) -> BrokerConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<BrokerConnectionState> {
        self.state.subscribe()
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        loop {
            self.transition(BrokerConnectionState::Connecting);
            let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CAPACITY);

            let ended = tokio::select! {
                _ = shutdown.cancelled() => None,
                ended = self.session(&client, &mut eventloop) => Some(ended),
            };

            match ended {
                None => {
                    self.close(&client, &mut eventloop).await;
                    break;
                }
                Some(SessionEnd::ConnectTimeout) => {
                    tracing::warn!(
                        timeout_ms = self.settings.connect_timeout_ms,
                        "Broker connect attempt timed out"
                    );
                }
                Some(SessionEnd::Transport(e)) => {
                    tracing::warn!("Broker connection lost: {}", e);
                }
            }

            self.transition(BrokerConnectionState::Disconnected);
            tracing::info!(
                delay_ms = self.settings.reconnect_period_ms,
                "Scheduling broker reconnect"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.reconnect_period()) => {}
            }
        }

        self.transition(BrokerConnectionState::Terminated);
        tracing::info!("Broker adapter stopped");
    }

    /// Connect, subscribe, then forward publishes until the transport fails.
    async fn session(&self, client: &AsyncClient, eventloop: &mut EventLoop) -> SessionEnd {
        match tokio::time::timeout(self.settings.connect_timeout(), wait_for_connack(eventloop)).await
        {
            Err(_) => return SessionEnd::ConnectTimeout,
            Ok(Err(e)) => return SessionEnd::Transport(e),
            Ok(Ok(())) => {}
        }

        self.transition(BrokerConnectionState::Connected);
        tracing::info!(address = %self.settings.broker_address(), "Connected to broker");

        if let Err(e) = client.try_subscribe(self.settings.topic_filter.as_str(), QoS::AtMostOnce) {
            tracing::warn!(filter = %self.settings.topic_filter, "Subscribe request failed: {}", e);
        }

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.dispatch(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        tracing::warn!(filter = %self.settings.topic_filter, "Broker rejected subscription");
                    } else {
                        tracing::debug!(filter = %self.settings.topic_filter, "Subscribed");
                    }
                }
                Ok(_) => {}
                Err(e) => return SessionEnd::Transport(e),
            }
        }
    }

    async fn close(&self, client: &AsyncClient, eventloop: &mut EventLoop) {
        if self.connection_state() != BrokerConnectionState::Connected {
            return;
        }
        if client.try_disconnect().is_ok() {
            // Drive the event loop briefly so the DISCONNECT actually goes out.
            let _ = tokio::time::timeout(DISCONNECT_GRACE, eventloop.poll()).await;
        }
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) {
        tracing::trace!(topic, bytes = payload.len(), "Broker message");
        for handler in &self.handlers {
            handler(topic, payload);
        }
    }

    fn transition(&self, next: BrokerConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(?previous, ?next, "Broker state transition");
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!("{}-{}", self.settings.client_id, std::process::id());
        let mut options = MqttOptions::new(
            client_id,
            self.settings.broker_address(),
            self.settings.port,
        );
        options.set_keep_alive(Duration::from_secs(self.settings.keep_alive_secs));
        options.set_clean_session(true);
        if self.settings.transport == BrokerTransport::Websocket {
            options.set_transport(Transport::Ws);
        }
        options
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}
