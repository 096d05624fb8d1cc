//! Telemetry Uplinks for Factory-Floor Devices
//!
//! ## Overview
//!
//! Protocol adapters that carry pipeline records off the device. Each
//! adapter implements the core [`Connectivity`] contract: one publish
//! attempt per record, a truthful `is_connected`, and no buffering of its
//! own — the pipeline's bounded queue is the only buffer in the system.
//!
//! ## Protocol Selection
//!
//! ### MQTT
//!
//! The default uplink for plant networks. Persistent connection, small
//! header overhead, topic-per-channel routing so dashboards and recorders
//! subscribe independently. Status records are published retained, giving
//! late subscribers the last known machine state.
//!
//! ### HTTP
//!
//! For sites where telemetry terminates in an existing REST service or
//! where only outbound HTTPS clears the firewall. Stateless, so
//! `is_connected` is always true and outages surface as failed publishes.
//!
//! ## Example
//!
//! ```no_run
//! use prodpulse_connectors::{mqtt::{MqttConfig, MqttLink}, TopicMap};
//!
//! # fn main() -> Result<(), prodpulse_connectors::UplinkError> {
//! let config = MqttConfig::new("broker.plant.local", 1883, "press_07");
//! let link = MqttLink::connect(config, TopicMap::new("press_07"))?;
//! // hand `link` to prodpulse_core::dispatch::Dispatcher
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttLink};

#[cfg(feature = "http")]
pub use http::{AuthMethod, HttpConfig, HttpLink};

pub use prodpulse_core::dispatch::Connectivity;
pub use prodpulse_core::record::Channel;

use thiserror::Error;

/// Errors raised while building an uplink
///
/// Delivery failures are not errors at this layer: the [`Connectivity`]
/// contract reports them as a `false` publish result and the dispatcher
/// owns the backoff.
#[derive(Debug, Error)]
pub enum UplinkError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level setup failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Delivery statistics common to all uplinks
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Records published successfully
    pub messages_sent: u64,
    /// Publish attempts that failed
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Times the transport reconnected after a drop
    pub reconnections: u32,
    /// Last transport error message
    pub last_error: Option<String>,
}

/// Maps record channels to publish destinations
///
/// Live and rollup records go to fixed shared topics; the status topic
/// gets the machine id appended so per-machine state can be retained
/// broker-side.
#[derive(Debug, Clone)]
pub struct TopicMap {
    live: String,
    rollup: String,
    status_prefix: String,
    machine_id: String,
}

impl TopicMap {
    /// Default plant topic layout for one machine
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            live: "machine/livedata/".into(),
            rollup: "machine/record/".into(),
            status_prefix: "machine/status/".into(),
            machine_id: machine_id.into(),
        }
    }

    /// Override the live-data topic
    pub fn live_topic(mut self, topic: impl Into<String>) -> Self {
        self.live = topic.into();
        self
    }

    /// Override the rollup topic
    pub fn rollup_topic(mut self, topic: impl Into<String>) -> Self {
        self.rollup = topic.into();
        self
    }

    /// Override the status topic prefix
    pub fn status_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.status_prefix = prefix.into();
        self
    }

    /// Destination topic for a channel
    pub fn topic(&self, channel: Channel) -> String {
        match channel {
            Channel::Live => self.live.clone(),
            Channel::Rollup => self.rollup.clone(),
            Channel::Status => format!("{}{}", self.status_prefix, self.machine_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_topic_carries_machine_id() {
        let topics = TopicMap::new("press_07");
        assert_eq!(topics.topic(Channel::Live), "machine/livedata/");
        assert_eq!(topics.topic(Channel::Rollup), "machine/record/");
        assert_eq!(topics.topic(Channel::Status), "machine/status/press_07");
    }

    #[test]
    fn topic_overrides() {
        let topics = TopicMap::new("m1")
            .live_topic("plant7/live")
            .status_prefix("plant7/state/");
        assert_eq!(topics.topic(Channel::Live), "plant7/live");
        assert_eq!(topics.topic(Channel::Status), "plant7/state/m1");
    }
}
