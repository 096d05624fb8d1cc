//! MQTT uplink over `rumqttc`
//!
//! The sync `rumqttc` client splits into a command half and an event loop.
//! [`MqttLink::connect`] parks the event loop on its own thread; that
//! thread owns reconnection and keeps the shared connected flag truthful,
//! so [`Connectivity::is_connected`] is a cheap atomic load from the
//! dispatch task.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use prodpulse_core::dispatch::Connectivity;
use prodpulse_core::record::Channel;

use crate::{ConnectionStats, TopicMap, UplinkError};

/// Hold-off before the event loop retries a dropped connection
const RECONNECT_HOLDOFF_MS: u64 = 1000;

/// MQTT uplink configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname or address
    pub broker: String,
    /// Broker port
    pub port: u16,
    /// Client id, unique per machine
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// QoS for all channels
    pub qos: QoS,
    /// Optional username/password
    pub credentials: Option<(String, String)>,
}

impl MqttConfig {
    /// New configuration with the plant defaults
    pub fn new(
        broker: impl Into<String>,
        port: u16,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            broker: broker.into(),
            port,
            client_id: client_id.into(),
            keep_alive_secs: 60,
            qos: QoS::AtMostOnce,
            credentials: None,
        }
    }

    /// Set username/password authentication
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Set the QoS used for every publish
    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Set the keep-alive interval
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }
}

/// MQTT implementation of the pipeline's [`Connectivity`] contract
pub struct MqttLink {
    client: Client,
    topics: TopicMap,
    qos: QoS,
    connected: Arc<AtomicBool>,
    reconnections: Arc<AtomicU32>,
    stats: ConnectionStats,
}

impl MqttLink {
    /// Connect to the broker and start the event-loop thread
    pub fn connect(config: MqttConfig, topics: TopicMap) -> Result<Self, UplinkError> {
        if config.broker.is_empty() {
            return Err(UplinkError::Config("broker address is empty".into()));
        }
        if config.client_id.is_empty() {
            return Err(UplinkError::Config("client id is empty".into()));
        }

        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let Some((username, password)) = &config.credentials {
            options.set_credentials(username, password);
        }

        let (client, connection) = Client::new(options, 16);

        let connected = Arc::new(AtomicBool::new(false));
        let reconnections = Arc::new(AtomicU32::new(0));
        Self::spawn_event_loop(connection, connected.clone(), reconnections.clone())?;

        Ok(Self {
            client,
            topics,
            qos: config.qos,
            connected,
            reconnections,
            stats: ConnectionStats::default(),
        })
    }

    fn spawn_event_loop(
        mut connection: Connection,
        connected: Arc<AtomicBool>,
        reconnections: Arc<AtomicU32>,
    ) -> Result<(), UplinkError> {
        thread::Builder::new()
            .name("mqtt-uplink".into())
            .spawn(move || {
                let mut was_connected = false;
                for event in connection.iter() {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            if was_connected {
                                reconnections.fetch_add(1, Ordering::Relaxed);
                            }
                            was_connected = true;
                            connected.store(true, Ordering::Relaxed);
                            log::info!("mqtt broker connected");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            connected.store(false, Ordering::Relaxed);
                            log::warn!("mqtt connection lost: {e}");
                            thread::sleep(Duration::from_millis(RECONNECT_HOLDOFF_MS));
                        }
                    }
                }
            })
            .map(|_| ())
            .map_err(|e| UplinkError::Transport(format!("event-loop thread: {e}")))
    }

    /// Delivery statistics, with reconnect count folded in
    pub fn stats(&self) -> ConnectionStats {
        let mut stats = self.stats.clone();
        stats.reconnections = self.reconnections.load(Ordering::Relaxed);
        stats
    }
}

impl Connectivity for MqttLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&mut self, channel: Channel, payload: &[u8]) -> bool {
        let topic = self.topics.topic(channel);
        // Status is retained so late subscribers see the last known state
        let retain = channel == Channel::Status;

        match self
            .client
            .try_publish(topic, self.qos, retain, payload.to_vec())
        {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += payload.len() as u64;
                true
            }
            Err(e) => {
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(e.to_string());
                log::warn!("mqtt publish failed: {e}");
                false
            }
        }
    }
}
