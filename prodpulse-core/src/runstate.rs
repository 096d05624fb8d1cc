//! Run/Stop State Machine Driven by the Tick Timeout
//!
//! Tracks whether the machine is producing. Any classified cycle means
//! Running; silence for strictly longer than the stop timeout means
//! Stopped. The timeout check is level-triggered from the polling task,
//! not interrupt-driven — it is the only cancellation-like semantic in the
//! pipeline.
//!
//! Exactly one [`StatusChange`] is emitted per transition; the dispatcher
//! turns these into status records on their own channel, distinct from the
//! high-frequency live records.

use crate::record::RunStatus;
use crate::time::Timestamp;

/// Default stop timeout in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u32 = 3000;

/// One run/stop transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// The state entered
    pub status: RunStatus,
    /// When the transition was observed
    pub timestamp: Timestamp,
}

/// Tracks Running/Stopped from cycle arrivals and a timeout
///
/// Exactly one instance exists per pipeline; only the polling task writes
/// it.
pub struct RunStateMachine {
    status: RunStatus,
    /// Timestamp of the last cycle (valid while Running)
    last_cycle: Timestamp,
    timeout_ms: u32,
}

impl RunStateMachine {
    /// State machine starting Stopped
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            status: RunStatus::Stopped,
            last_cycle: 0,
            timeout_ms,
        }
    }

    /// Current status
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Whether the machine is currently producing
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Feed a classified cycle, refreshing the stop timer
    ///
    /// Returns a status change on the Stopped → Running edge.
    pub fn on_cycle(&mut self, timestamp: Timestamp) -> Option<StatusChange> {
        self.last_cycle = timestamp;

        if self.status == RunStatus::Running {
            return None;
        }

        self.status = RunStatus::Running;
        #[cfg(feature = "log")]
        log::info!("machine started running at {}ms", timestamp);

        Some(StatusChange {
            status: RunStatus::Running,
            timestamp,
        })
    }

    /// Level-triggered timeout check, called once per polling iteration
    ///
    /// Transitions to Stopped only when the elapsed time since the last
    /// cycle *exceeds* the timeout: at exactly `timeout_ms` elapsed the
    /// machine is still Running.
    pub fn poll(&mut self, now: Timestamp) -> Option<StatusChange> {
        if self.status != RunStatus::Running {
            return None;
        }

        if now.saturating_sub(self.last_cycle) <= self.timeout_ms as u64 {
            return None;
        }

        self.status = RunStatus::Stopped;
        #[cfg(feature = "log")]
        log::info!("machine stopped, no cycle for {}ms", self.timeout_ms);

        Some(StatusChange {
            status: RunStatus::Stopped,
            timestamp: now,
        })
    }

    /// Update the stop timeout (configuration change boundary)
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }
}
