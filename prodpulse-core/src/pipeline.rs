//! Pipeline Wiring: Tick Latch to Telemetry Queue
//!
//! ## Overview
//!
//! [`CyclePipeline`] owns the single-writer pieces of the pipeline
//! (classifier, run state machine, aggregator) and borrows the two
//! cross-context resources: the debounce latch (shared with the ISR) and
//! the telemetry queue (shared with the dispatch task).
//!
//! ```text
//! raw edge → EdgeDebouncer → CycleClassifier → {RunStateMachine, Aggregator}
//!                                                      ↓
//!                                     TelemetryRecord → TelemetryQueue → Dispatcher
//! ```
//!
//! ## Scheduling
//!
//! [`CyclePipeline::poll`] is one iteration of the periodic task (10 ms by
//! default). Each iteration:
//!
//! 1. consumes a pending tick and classifies it,
//! 2. runs the level-triggered stop-timeout check,
//! 3. advances the run/stop elapsed-time accumulators by the poll period,
//! 4. flushes whichever windows are due, enqueueing the records.
//!
//! Cycles are classified and forwarded in tick arrival order; there is no
//! reordering anywhere in the pipeline. Enqueue never blocks — a full
//! queue drops the new record and the queue counts the drop.

use crate::aggregate::Aggregator;
use crate::config::PipelineConfig;
use crate::cycle::{CycleClassifier, RejectInputs};
use crate::queue::TelemetryQueue;
use crate::record::{RunStatus, TelemetryRecord};
use crate::runstate::{RunStateMachine, StatusChange};
use crate::tick::EdgeDebouncer;
use crate::time::Timestamp;

/// The counting pipeline, driven by a periodic polling task
pub struct CyclePipeline<'a, const N: usize> {
    latch: &'a EdgeDebouncer,
    queue: &'a TelemetryQueue<N>,
    classifier: CycleClassifier,
    machine: RunStateMachine,
    aggregator: Aggregator,
    poll_period_ms: u32,
}

impl<'a, const N: usize> CyclePipeline<'a, N> {
    /// Wire up a pipeline from its configuration and shared resources
    ///
    /// Pushes the configured debounce interval into the latch; everything
    /// else the latch needs is ISR-side state.
    pub fn new(
        config: &PipelineConfig,
        latch: &'a EdgeDebouncer,
        queue: &'a TelemetryQueue<N>,
    ) -> Self {
        latch.set_debounce_ms(config.debounce_ms);

        Self {
            latch,
            queue,
            classifier: CycleClassifier::new(),
            machine: RunStateMachine::new(config.stop_timeout_ms),
            aggregator: Aggregator::new(
                config.machine_id,
                config.live_interval_ms,
                config.rollup_interval_ms,
            ),
            poll_period_ms: config.poll_period_ms,
        }
    }

    /// Run one iteration of the polling task
    ///
    /// `now` comes from the monotonic clock; `rejects` is sampled at most
    /// once, and only when a cycle is classified.
    pub fn poll<R: RejectInputs>(&mut self, now: Timestamp, rejects: &mut R) {
        // Tick consumption and classification, in arrival order
        if let Some(tick) = self.latch.take() {
            match self.classifier.on_tick(tick, rejects) {
                Ok(Some(cycle)) => {
                    if let Some(change) = self.machine.on_cycle(cycle.timestamp) {
                        self.apply_status(change);
                    }
                    self.aggregator.on_cycle(&cycle);
                }
                Ok(None) => {
                    // Calibration tick: reference point only, no cycle yet
                }
                Err(_e) => {
                    // Timing fault; counted by the classifier, not forwarded
                    #[cfg(feature = "log")]
                    log::warn!("discarded tick: {}", _e);
                }
            }
        }

        // Level-triggered stop timeout
        if let Some(change) = self.machine.poll(now) {
            self.classifier.reset();
            self.apply_status(change);
        }

        // Elapsed-time accounting by poll period, immune to jitter
        self.aggregator
            .tick_elapsed(self.machine.status(), self.poll_period_ms);

        // Window flushes
        if self.aggregator.live_due(now) {
            let record = self.aggregator.live_record(self.machine.status());
            if self.queue.push(record) {
                self.aggregator.commit_live(now);
            } else {
                self.aggregator.defer_live(now);
            }
        }

        if self.aggregator.rollup_due(now) {
            if let Some(record) = self.aggregator.rollup_record(now) {
                if self.queue.push(record) {
                    self.aggregator.commit_rollup(now);
                } else {
                    self.aggregator.defer_rollup(now);
                }
            }
        }
    }

    fn apply_status(&mut self, change: StatusChange) {
        self.aggregator.on_status(change.status);

        let record = TelemetryRecord::Status {
            machine_id: *self.aggregator.machine_id(),
            status: change.status,
        };
        // Drop-on-full; the queue counts it
        let _ = self.queue.push(record);
    }

    /// Current run status
    pub fn status(&self) -> RunStatus {
        self.machine.status()
    }

    /// Ticks discarded as timing faults
    pub fn faults(&self) -> u32 {
        self.classifier.faults()
    }

    /// Aggregation state, for inspection
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}
