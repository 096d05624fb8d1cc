//! Error Types for the Counting and Dispatch Pipeline
//!
//! The error system follows the same rules as the rest of the crate:
//!
//! 1. **Small Size**: each variant is a few words at most; errors are
//!    returned on the polling hot path and must be cheap to move.
//!
//! 2. **No Heap Allocation**: all error data is inline, messages are
//!    `&'static str`. Memory usage stays deterministic.
//!
//! 3. **Copy Semantics**: errors implement Copy so they can be returned
//!    without move-semantics complications.
//!
//! 4. **Degrade, Don't Halt**: none of these errors is fatal to the
//!    process. The pipeline is designed to lose telemetry rather than stop
//!    counting (see the drop policies in `queue` and `dispatch`).
//!
//! ## Error Categories
//!
//! ### Transient timing faults
//! - `InvalidDuration`: a computed cycle duration was not positive. This is
//!   a timing fault (clock glitch, mis-wired sensor), never production data;
//!   the cycle is discarded and counted as a diagnostic event.
//!
//! ### Backpressure
//! - `QueueFull`: the telemetry queue rejected a record. The record is
//!   dropped and counted; producers never retry.
//!
//! ### Delivery
//! - `NotConnected`: the network link is down; the dispatcher waits.
//! - `DeliveryFailed`: one publish attempt failed; in the baseline policy
//!   the record is discarded and the dispatcher backs off.
//! - `Serialize`: a record could not be encoded (should not happen for the
//!   fixed schemas; surfaced rather than silently skipped).

use thiserror_no_std::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PipelineError {
    /// Computed cycle duration was zero or negative
    #[error("invalid cycle duration {duration_s}s (timing fault)")]
    InvalidDuration {
        /// The non-positive duration that was rejected
        duration_s: f32,
    },

    /// Telemetry queue is at capacity; the new record was dropped
    #[error("telemetry queue full ({capacity} slots), record dropped")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Network link reports down; nothing was attempted
    #[error("connectivity provider reports not connected")]
    NotConnected,

    /// One delivery attempt failed; record discarded per baseline policy
    #[error("delivery attempt failed on channel {channel:?}")]
    DeliveryFailed {
        /// Channel the record was bound for
        channel: crate::record::Channel,
    },

    /// Record could not be serialized
    #[error("record serialization failed")]
    Serialize,
}

#[cfg(feature = "defmt")]
impl defmt::Format for PipelineError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidDuration { duration_s } => {
                defmt::write!(fmt, "invalid duration {}s", duration_s)
            }
            Self::QueueFull { capacity } => {
                defmt::write!(fmt, "queue full ({} slots)", capacity)
            }
            Self::NotConnected => defmt::write!(fmt, "not connected"),
            Self::DeliveryFailed { .. } => defmt::write!(fmt, "delivery failed"),
            Self::Serialize => defmt::write!(fmt, "serialize failed"),
        }
    }
}
