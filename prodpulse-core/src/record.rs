//! Telemetry Records for the Dispatch Pipeline
//!
//! ## Overview
//!
//! This module defines the three record shapes the pipeline delivers
//! downstream. Field names are a stable contract with the server-side
//! consumers and must not change:
//!
//! - **live**: high-frequency snapshot published every live-window flush
//!   `{machine_id, status, cycle_time, cpm, good_path_count, reject_count,
//!   start_time, stop_time}`
//! - **rollup**: periodic window average
//!   `{machine_id, cycle_time, cpm, good_path_count, reject_count,
//!   start_time, stop_time}`
//! - **status**: run/stop edge, published once per transition
//!   `{machine_id, status}`
//!
//! ## Memory Model
//!
//! Records are designed for the lock-free telemetry queue:
//! - **Fixed size**: machine id is stored inline (no heap), so a record is
//!   a small Copy value that moves through queue slots by value.
//! - **Immutable**: a record is never mutated after construction; ownership
//!   transfers to the queue on enqueue and to the dispatcher on dequeue.
//!
//! Each record knows its delivery [`Channel`]; the dispatcher maps channels
//! to topics/endpoints without inspecting record contents.

use core::fmt;

/// Maximum length for inline machine IDs
pub const MAX_INLINE_ID: usize = 15;

/// Inline string for machine IDs
///
/// Avoids heap allocation so records stay Copy and queue slots stay POD.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InlineString {
    len: u8,
    data: [u8; MAX_INLINE_ID],
}

impl InlineString {
    /// Create from string slice
    ///
    /// Returns `None` if the string exceeds [`MAX_INLINE_ID`] bytes.
    pub fn new(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_INLINE_ID {
            return None;
        }

        let mut data = [0u8; MAX_INLINE_ID];
        data[..bytes.len()].copy_from_slice(bytes);

        Some(Self {
            len: bytes.len() as u8,
            data,
        })
    }

    /// The empty id, used until a real one is configured
    pub const fn empty() -> Self {
        Self {
            len: 0,
            data: [0u8; MAX_INLINE_ID],
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        // new() only stores complete str slices, so this cannot fail
        core::str::from_utf8(&self.data[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for InlineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for InlineString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Machine run status as reported downstream
///
/// The wire strings ("RUNNING"/"STOP") are part of the downstream contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunStatus {
    /// No cycle observed within the stop timeout
    Stopped = 0,
    /// Cycles arriving within the stop timeout
    Running = 1,
}

impl RunStatus {
    /// Wire representation expected by downstream consumers
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Stopped => "STOP",
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RunStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Delivery channel for a record
///
/// Maps one-to-one onto the downstream topics/endpoints; the dispatcher
/// resolves the concrete topic string from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    /// High-frequency live snapshots
    Live = 0,
    /// Periodic window averages
    Rollup = 1,
    /// Run/stop transitions
    Status = 2,
}

/// One telemetry record bound for delivery
///
/// Immutable after creation. Field names serialize exactly as the
/// downstream consumers expect them.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum TelemetryRecord {
    /// Live snapshot: latest instantaneous cycle plus counts accumulated
    /// since the previous live flush
    Live {
        /// Machine identifier
        machine_id: InlineString,
        /// Current run status
        status: RunStatus,
        /// Latest cycle duration in seconds (0 while stopped)
        cycle_time: f32,
        /// Latest cycles-per-minute (0 while stopped)
        cpm: f32,
        /// Good cycles since last live flush
        good_path_count: u32,
        /// Rejected cycles since last live flush
        reject_count: u32,
        /// Seconds spent running since last live flush
        start_time: u32,
        /// Seconds spent stopped since last live flush
        stop_time: u32,
    },

    /// Window average: means over all cycles in the rollup window
    Rollup {
        /// Machine identifier
        machine_id: InlineString,
        /// Mean cycle duration over the window, seconds
        cycle_time: f32,
        /// Mean cycles-per-minute over the window
        cpm: f32,
        /// Good cycles in the window
        good_path_count: u32,
        /// Rejected cycles in the window
        reject_count: u32,
        /// Seconds spent running during the window
        start_time: u32,
        /// Seconds spent stopped during the window
        stop_time: u32,
    },

    /// Run/stop transition, exactly one per status change
    Status {
        /// Machine identifier
        machine_id: InlineString,
        /// New run status
        status: RunStatus,
    },
}

impl TelemetryRecord {
    /// Delivery channel this record belongs to
    pub const fn channel(&self) -> Channel {
        match self {
            TelemetryRecord::Live { .. } => Channel::Live,
            TelemetryRecord::Rollup { .. } => Channel::Rollup,
            TelemetryRecord::Status { .. } => Channel::Status,
        }
    }

    /// Machine this record describes
    pub const fn machine_id(&self) -> &InlineString {
        match self {
            TelemetryRecord::Live { machine_id, .. } => machine_id,
            TelemetryRecord::Rollup { machine_id, .. } => machine_id,
            TelemetryRecord::Status { machine_id, .. } => machine_id,
        }
    }

    /// Serialize to the JSON payload delivered downstream
    #[cfg(any(feature = "std", feature = "alloc"))]
    pub fn to_json(&self) -> Result<serde_json::Value, crate::errors::PipelineError> {
        serde_json::to_value(self).map_err(|_| crate::errors::PipelineError::Serialize)
    }

    /// Serialize to the JSON payload bytes delivered downstream
    #[cfg(any(feature = "std", feature = "alloc"))]
    pub fn to_payload(&self) -> Result<alloc::vec::Vec<u8>, crate::errors::PipelineError> {
        serde_json::to_vec(self).map_err(|_| crate::errors::PipelineError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_small() {
        // Records travel through queue slots by value
        assert!(core::mem::size_of::<TelemetryRecord>() <= 64);
    }

    #[test]
    fn inline_string() {
        let s = InlineString::new("press_07").unwrap();
        assert_eq!(s.as_str(), "press_07");

        // Too long
        assert!(InlineString::new("this_is_a_very_long_machine_id").is_none());
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(RunStatus::Running.as_str(), "RUNNING");
        assert_eq!(RunStatus::Stopped.as_str(), "STOP");
    }

    #[cfg(feature = "std")]
    #[test]
    fn live_record_field_names() {
        let record = TelemetryRecord::Live {
            machine_id: InlineString::new("press_07").unwrap(),
            status: RunStatus::Running,
            cycle_time: 1.5,
            cpm: 40.0,
            good_path_count: 7,
            reject_count: 1,
            start_time: 2,
            stop_time: 0,
        };

        let json = record.to_json().unwrap();
        assert_eq!(json["machine_id"], "press_07");
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["good_path_count"], 7);
        assert_eq!(json["reject_count"], 1);
        assert_eq!(json["start_time"], 2);
        assert_eq!(json["stop_time"], 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn status_record_omits_counters() {
        let record = TelemetryRecord::Status {
            machine_id: InlineString::new("press_07").unwrap(),
            status: RunStatus::Stopped,
        };

        let json = record.to_json().unwrap();
        assert_eq!(json["status"], "STOP");
        assert!(json.get("cycle_time").is_none());
    }
}
