//! HTTP uplink over `ureq`
//!
//! For deployments that terminate telemetry in a REST collector instead of
//! a broker. HTTP is stateless, so `is_connected` is always true and an
//! unreachable collector shows up as a failed publish, which the
//! dispatcher already handles with its backoff.
//!
//! One request per record, no internal retry: retry policy belongs to the
//! dispatch loop, and doubling it here would stall the consumer task.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use prodpulse_core::dispatch::Connectivity;
use prodpulse_core::record::Channel;

use crate::{ConnectionStats, UplinkError};

/// Authentication methods
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer(String),
    /// Basic authentication
    Basic {
        /// Account name
        username: String,
        /// Account password
        password: String,
    },
    /// API key in a custom header
    ApiKey {
        /// Header name
        header: String,
        /// Header value
        value: String,
    },
}

/// HTTP uplink configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the collector
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Extra headers added to every request
    pub headers: HashMap<String, String>,
    /// Path for live records
    pub live_path: String,
    /// Path for rollup records
    pub rollup_path: String,
    /// Path for status records
    pub status_path: String,
}

impl HttpConfig {
    /// New configuration with the default collector paths
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            live_path: "/machine/livedata".into(),
            rollup_path: "/machine/record".into(),
            status_path: "/machine/status".into(),
        }
    }

    /// Set bearer token authentication
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Add a custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// HTTP implementation of the pipeline's [`Connectivity`] contract
pub struct HttpLink {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: ConnectionStats,
}

impl HttpLink {
    /// Build the uplink and its connection-pooling agent
    pub fn new(config: HttpConfig) -> Result<Self, UplinkError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(UplinkError::Config(
                "base URL must start with http:// or https://".into(),
            ));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&format!("ProdPulse/{}", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self {
            config,
            agent,
            stats: ConnectionStats::default(),
        })
    }

    fn path_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Live => &self.config.live_path,
            Channel::Rollup => &self.config.rollup_path,
            Channel::Status => &self.config.status_path,
        }
    }

    fn build_request(&self, url: &str) -> ureq::Request {
        let mut request = self
            .agent
            .post(url)
            .set("Content-Type", "application/json");

        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {token}"));
            }
            AuthMethod::Basic { username, password } => {
                let credentials = BASE64.encode(format!("{username}:{password}"));
                request = request.set("Authorization", &format!("Basic {credentials}"));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
    }

    /// Delivery statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}

impl Connectivity for HttpLink {
    fn is_connected(&self) -> bool {
        // Stateless transport; outages surface as failed publishes
        true
    }

    fn publish(&mut self, channel: Channel, payload: &[u8]) -> bool {
        let url = format!("{}{}", self.config.base_url, self.path_for(channel));

        match self.build_request(&url).send_bytes(payload) {
            Ok(_) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += payload.len() as u64;
                true
            }
            Err(ureq::Error::Status(code, _)) => {
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(format!("HTTP {code}"));
                log::warn!("collector rejected {channel:?} record: HTTP {code}");
                false
            }
            Err(ureq::Error::Transport(e)) => {
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(e.to_string());
                log::warn!("collector unreachable: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = HttpConfig::new("https://telemetry.plant.local")
            .bearer_token("token")
            .timeout_secs(5)
            .header("X-Plant", "7");

        assert_eq!(config.base_url, "https://telemetry.plant.local");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.headers.contains_key("X-Plant"));
        assert!(matches!(config.auth, AuthMethod::Bearer(_)));
    }

    #[test]
    fn url_scheme_validated() {
        assert!(HttpLink::new(HttpConfig::new("not-a-url")).is_err());
        assert!(HttpLink::new(HttpConfig::new("https://valid.url")).is_ok());
    }

    #[test]
    fn channels_map_to_collector_paths() {
        let link = HttpLink::new(HttpConfig::new("https://c.local")).unwrap();
        assert_eq!(link.path_for(Channel::Live), "/machine/livedata");
        assert_eq!(link.path_for(Channel::Rollup), "/machine/record");
        assert_eq!(link.path_for(Channel::Status), "/machine/status");
    }
}
