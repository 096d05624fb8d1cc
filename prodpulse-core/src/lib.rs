//! Production-cycle counting and telemetry dispatch for ProdPulse
//!
//! Turns raw sensor edges from a factory machine into classified
//! production cycles, run/stop status, and rolling aggregates, and carries
//! the resulting records through a bounded queue to a network sink.
//!
//! Key constraints:
//! - Runs on small MCU-class targets (no_std capable)
//! - No heap allocation on the counting hot path
//! - The interrupt path does nothing but latch an edge
//! - Telemetry degrades (drops) under outage; counting never halts
//!
//! ```no_run
//! use prodpulse_core::{
//!     config::PipelineConfig,
//!     cycle::NoRejectInputs,
//!     pipeline::CyclePipeline,
//!     queue::TelemetryQueue,
//!     tick::EdgeDebouncer,
//! };
//!
//! static LATCH: EdgeDebouncer = EdgeDebouncer::new(50);
//! static QUEUE: TelemetryQueue<256> = TelemetryQueue::new();
//!
//! let config = PipelineConfig::default();
//! let mut pipeline = CyclePipeline::new(&config, &LATCH, &QUEUE);
//!
//! // ISR: LATCH.offer(now_ms)
//! // polling task, every 10 ms:
//! pipeline.poll(0, &mut NoRejectInputs);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(any(feature = "alloc", feature = "std"))]
extern crate alloc;

pub mod aggregate;
pub mod config;
pub mod cycle;
#[cfg(any(feature = "std", feature = "alloc"))]
pub mod dispatch;
pub mod errors;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod runstate;
pub mod tick;
pub mod time;

// Public API
pub use config::PipelineConfig;
pub use cycle::{Cycle, CycleClassifier, FnRejects, NoRejectInputs, RejectInputs, RejectMask};
#[cfg(any(feature = "std", feature = "alloc"))]
pub use dispatch::{Connectivity, Dispatcher};
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::CyclePipeline;
pub use queue::TelemetryQueue;
pub use record::{Channel, RunStatus, TelemetryRecord};
pub use runstate::RunStateMachine;
pub use tick::EdgeDebouncer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
