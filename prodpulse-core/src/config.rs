//! Pipeline Configuration and the Persistent Store Boundary
//!
//! Configuration is loaded from a key-value [`ConfigStore`] once at
//! startup (or at an explicit configuration-change boundary) and carried
//! as a plain struct from then on — the store is never touched on the hot
//! path. Key names are stable: they match what fielded devices already
//! have persisted.
//!
//! Validating configuration against the actual wiring (e.g. reject-sensor
//! count) is the collaborator's job before the pipeline starts; the
//! pipeline takes the config at face value.

use crate::aggregate::{DEFAULT_LIVE_INTERVAL_MS, DEFAULT_ROLLUP_INTERVAL_MS};
use crate::record::InlineString;
use crate::runstate::DEFAULT_STOP_TIMEOUT_MS;
use crate::tick::DEFAULT_DEBOUNCE_MS;

/// Default polling period of the classification task, milliseconds
pub const DEFAULT_POLL_PERIOD_MS: u32 = 10;

/// Default backoff after a failed delivery, milliseconds
///
/// Lives here rather than in `dispatch` so the configuration compiles on
/// no_std builds where the serializing dispatcher is compiled out.
pub const DEFAULT_RETRY_BACKOFF_MS: u32 = 500;

/// Persisted key names (stable across firmware generations)
pub mod keys {
    /// Machine identifier reported in every record
    pub const MACHINE_ID: &str = "machine_id";
    /// Debounce interval, ms
    pub const DEBOUNCE_MS: &str = "debounce_delay";
    /// Stop timeout, ms
    pub const STOP_TIMEOUT_MS: &str = "timeout";
}

/// Persistent key-value store for named scalars
///
/// The external collaborator boundary for preferences/EEPROM storage.
/// Used only at startup and configuration-change boundaries.
pub trait ConfigStore {
    /// Read a scalar, `None` if the key was never written
    fn get_u32(&self, key: &str) -> Option<u32>;

    /// Persist a scalar
    fn put_u32(&mut self, key: &str, value: u32);

    /// Read a string value, `None` if the key was never written
    fn get_str(&self, key: &str) -> Option<&str>;

    /// Persist a string value
    fn put_str(&mut self, key: &str, value: &str);
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Machine identifier stamped on every record
    pub machine_id: InlineString,
    /// Debounce interval for the cycle sensor edge, ms
    pub debounce_ms: u32,
    /// Silence threshold for the Running → Stopped transition, ms
    pub stop_timeout_ms: u32,
    /// Period of the classification polling task, ms
    pub poll_period_ms: u32,
    /// Live window flush interval, ms
    pub live_interval_ms: u32,
    /// Rollup window flush interval, ms
    pub rollup_interval_ms: u32,
    /// Dispatcher backoff after a failed delivery, ms
    pub retry_backoff_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            machine_id: InlineString::empty(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
            live_interval_ms: DEFAULT_LIVE_INTERVAL_MS,
            rollup_interval_ms: DEFAULT_ROLLUP_INTERVAL_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl PipelineConfig {
    /// Load persisted values, falling back to defaults for missing keys
    ///
    /// A machine id longer than the inline capacity is treated as missing
    /// rather than truncated.
    pub fn load<S: ConfigStore>(store: &S) -> Self {
        let defaults = Self::default();

        let machine_id = store
            .get_str(keys::MACHINE_ID)
            .and_then(InlineString::new)
            .unwrap_or(defaults.machine_id);

        Self {
            machine_id,
            debounce_ms: store
                .get_u32(keys::DEBOUNCE_MS)
                .unwrap_or(defaults.debounce_ms),
            stop_timeout_ms: store
                .get_u32(keys::STOP_TIMEOUT_MS)
                .unwrap_or(defaults.stop_timeout_ms),
            ..defaults
        }
    }

    /// Persist the tunable values
    pub fn save<S: ConfigStore>(&self, store: &mut S) {
        store.put_str(keys::MACHINE_ID, self.machine_id.as_str());
        store.put_u32(keys::DEBOUNCE_MS, self.debounce_ms);
        store.put_u32(keys::STOP_TIMEOUT_MS, self.stop_timeout_ms);
    }

    /// Overwrite the store with factory defaults
    pub fn factory_reset<S: ConfigStore>(store: &mut S) {
        Self::default().save(store);
    }
}

/// In-memory store for tests and host-side tooling
pub struct MemoryStore {
    scalars: heapless::FnvIndexMap<heapless::String<24>, u32, 16>,
    strings: heapless::FnvIndexMap<heapless::String<24>, heapless::String<64>, 16>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            scalars: heapless::FnvIndexMap::new(),
            strings: heapless::FnvIndexMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryStore {
    fn get_u32(&self, key: &str) -> Option<u32> {
        let key = heapless::String::<24>::try_from(key).ok()?;
        self.scalars.get(&key).copied()
    }

    fn put_u32(&mut self, key: &str, value: u32) {
        if let Ok(key) = heapless::String::try_from(key) {
            let _ = self.scalars.insert(key, value);
        }
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        let key = heapless::String::<24>::try_from(key).ok()?;
        self.strings.get(&key).map(|s| s.as_str())
    }

    fn put_str(&mut self, key: &str, value: &str) {
        if let (Ok(key), Ok(value)) = (
            heapless::String::try_from(key),
            heapless::String::try_from(value),
        ) {
            let _ = self.strings.insert(key, value);
        }
    }
}
