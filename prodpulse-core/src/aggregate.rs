//! Rolling Aggregation of the Cycle Stream
//!
//! ## Overview
//!
//! The aggregator produces two cadences of output from one cycle stream
//! without double counting:
//!
//! - **live window** (default 2 s): the latest instantaneous cycle plus
//!   good/reject counts and run/stop elapsed seconds accumulated since the
//!   previous flush.
//! - **rollup window** (default 30 s): mean duration and mean rate across
//!   all cycles observed in the window, plus cumulative counts.
//!
//! Both windows reset to zero after a committed flush and are never
//! partially flushed. A rollup window with zero samples is skipped
//! entirely — a zero-sample average is undefined, not zero.
//!
//! ## Elapsed-Time Accounting
//!
//! Run/stop elapsed time advances by the fixed polling period while the
//! corresponding run state holds ([`Aggregator::tick_elapsed`]), not by
//! wall-clock diffing. Scheduling jitter therefore cannot drift the live
//! and rollup windows apart.
//!
//! ## Flush Protocol
//!
//! Flushing is split so the counters only reset once the record was
//! actually accepted downstream (the queue may be full):
//!
//! ```text
//! if aggregator.live_due(now) {
//!     let record = aggregator.live_record(status);
//!     if queue.push(record) { aggregator.commit_live(now) }
//!     else                  { aggregator.defer_live(now) }
//! }
//! ```
//!
//! `defer` closes the attempt window without zeroing counters, so a full
//! queue loses the flush cadence slot but never the counts.

use crate::cycle::Cycle;
use crate::record::{InlineString, RunStatus, TelemetryRecord};
use crate::time::Timestamp;

/// Default live-window flush interval in milliseconds
pub const DEFAULT_LIVE_INTERVAL_MS: u32 = 2000;

/// Default rollup-window flush interval in milliseconds
pub const DEFAULT_ROLLUP_INTERVAL_MS: u32 = 30_000;

/// Per-window accumulation state
///
/// Owned exclusively by the [`Aggregator`]; reset to zero immediately
/// after a committed flush.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowAggregate {
    /// Good cycles in the window
    pub good_count: u32,
    /// Rejected cycles in the window
    pub reject_count: u32,
    /// Sum of cycle durations, seconds
    pub sum_duration: f32,
    /// Sum of cycle rates, cycles/minute
    pub sum_rate: f32,
    /// Number of cycles accumulated (incremented exactly once per cycle)
    pub sample_count: u32,
    /// Milliseconds spent running, advanced by the polling period
    pub run_ms: u64,
    /// Milliseconds spent stopped, advanced by the polling period
    pub stop_ms: u64,
    /// When the window opened
    pub start_time: Timestamp,
    /// Timestamp of the last cycle folded in
    pub end_time: Timestamp,
}

impl WindowAggregate {
    fn record_cycle(&mut self, cycle: &Cycle) {
        if cycle.rejected {
            self.reject_count += 1;
        } else {
            self.good_count += 1;
        }
        self.sum_duration += cycle.duration_s;
        self.sum_rate += cycle.rate_per_min;
        self.sample_count += 1;
        self.end_time = cycle.timestamp;
    }

    fn reset(&mut self, now: Timestamp) {
        *self = Self {
            start_time: now,
            ..Self::default()
        };
    }

    /// Seconds spent running in this window
    pub fn run_secs(&self) -> u32 {
        (self.run_ms / 1000) as u32
    }

    /// Seconds spent stopped in this window
    pub fn stop_secs(&self) -> u32 {
        (self.stop_ms / 1000) as u32
    }
}

/// Accumulates cycles into live and rollup windows
///
/// All counters live here as fields rather than process globals so the
/// aggregator can be unit tested without a device runtime. Single-writer:
/// only the polling task touches it.
pub struct Aggregator {
    machine_id: InlineString,
    live: WindowAggregate,
    rollup: WindowAggregate,
    /// Latest instantaneous readings; zeroed while stopped
    cycle_time: f32,
    cpm: f32,
    live_interval_ms: u32,
    rollup_interval_ms: u32,
    last_live_flush: Timestamp,
    last_rollup_flush: Timestamp,
}

impl Aggregator {
    /// Fresh aggregator with both windows empty
    pub fn new(machine_id: InlineString, live_interval_ms: u32, rollup_interval_ms: u32) -> Self {
        Self {
            machine_id,
            live: WindowAggregate::default(),
            rollup: WindowAggregate::default(),
            cycle_time: 0.0,
            cpm: 0.0,
            live_interval_ms,
            rollup_interval_ms,
            last_live_flush: 0,
            last_rollup_flush: 0,
        }
    }

    /// Fold one classified cycle into both windows
    pub fn on_cycle(&mut self, cycle: &Cycle) {
        self.cycle_time = cycle.duration_s;
        self.cpm = cycle.rate_per_min;
        self.live.record_cycle(cycle);
        self.rollup.record_cycle(cycle);
    }

    /// React to a run/stop transition
    ///
    /// Instantaneous readings are meaningless while stopped and are zeroed
    /// so the next live record does not repeat the last cycle forever.
    pub fn on_status(&mut self, status: RunStatus) {
        if status == RunStatus::Stopped {
            self.cycle_time = 0.0;
            self.cpm = 0.0;
        }
    }

    /// Advance run/stop elapsed time by one polling period
    ///
    /// Called once per flush-poll iteration with the fixed period; both
    /// windows advance together so they cannot drift apart.
    pub fn tick_elapsed(&mut self, status: RunStatus, period_ms: u32) {
        match status {
            RunStatus::Running => {
                self.live.run_ms += period_ms as u64;
                self.rollup.run_ms += period_ms as u64;
            }
            RunStatus::Stopped => {
                self.live.stop_ms += period_ms as u64;
                self.rollup.stop_ms += period_ms as u64;
            }
        }
    }

    /// Whether the live window is due for a flush
    pub fn live_due(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.last_live_flush) >= self.live_interval_ms as u64
    }

    /// Build the live record for the current window (does not reset)
    pub fn live_record(&self, status: RunStatus) -> TelemetryRecord {
        TelemetryRecord::Live {
            machine_id: self.machine_id,
            status,
            cycle_time: self.cycle_time,
            cpm: self.cpm,
            good_path_count: self.live.good_count,
            reject_count: self.live.reject_count,
            start_time: self.live.run_secs(),
            stop_time: self.live.stop_secs(),
        }
    }

    /// Commit a live flush: reset the window, close the interval
    pub fn commit_live(&mut self, now: Timestamp) {
        self.live.reset(now);
        self.last_live_flush = now;
    }

    /// Close the live interval without resetting (record was not accepted)
    pub fn defer_live(&mut self, now: Timestamp) {
        self.last_live_flush = now;
    }

    /// Whether the rollup window is due for a flush
    pub fn rollup_due(&self, now: Timestamp) -> bool {
        now.saturating_sub(self.last_rollup_flush) >= self.rollup_interval_ms as u64
    }

    /// Build the rollup record, or `None` for a zero-sample window
    ///
    /// A zero-sample window is skipped entirely: the window restarts and
    /// no record is emitted, because `sum / 0` is undefined rather than
    /// zero. The skipped window's idle seconds are dropped with it.
    pub fn rollup_record(&mut self, now: Timestamp) -> Option<TelemetryRecord> {
        if self.rollup.sample_count == 0 {
            self.rollup.reset(now);
            self.last_rollup_flush = now;
            #[cfg(feature = "log")]
            log::debug!("rollup window empty, skipping flush");
            return None;
        }

        let samples = self.rollup.sample_count as f32;
        Some(TelemetryRecord::Rollup {
            machine_id: self.machine_id,
            cycle_time: self.rollup.sum_duration / samples,
            cpm: self.rollup.sum_rate / samples,
            good_path_count: self.rollup.good_count,
            reject_count: self.rollup.reject_count,
            start_time: self.rollup.run_secs(),
            stop_time: self.rollup.stop_secs(),
        })
    }

    /// Commit a rollup flush: reset the window, close the interval
    pub fn commit_rollup(&mut self, now: Timestamp) {
        self.rollup.reset(now);
        self.last_rollup_flush = now;
    }

    /// Close the rollup interval without resetting
    pub fn defer_rollup(&mut self, now: Timestamp) {
        self.last_rollup_flush = now;
    }

    /// Machine identifier stamped on every record
    pub fn machine_id(&self) -> &InlineString {
        &self.machine_id
    }

    /// Current live-window state, for inspection
    pub fn live_window(&self) -> &WindowAggregate {
        &self.live
    }

    /// Current rollup-window state, for inspection
    pub fn rollup_window(&self) -> &WindowAggregate {
        &self.rollup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::RejectMask;

    fn machine() -> InlineString {
        InlineString::new("press_07").unwrap()
    }

    fn cycle(duration_s: f32, rejected: bool, timestamp: Timestamp) -> Cycle {
        let mut mask = RejectMask::empty();
        if rejected {
            mask.set(0);
        }
        Cycle {
            duration_s,
            rate_per_min: 60.0 / duration_s,
            rejected,
            reject_mask: mask,
            timestamp,
        }
    }

    #[test]
    fn counts_accumulate_once_per_cycle() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);

        agg.on_cycle(&cycle(1.0, false, 1000));
        agg.on_cycle(&cycle(0.5, true, 1500));

        assert_eq!(agg.live_window().good_count, 1);
        assert_eq!(agg.live_window().reject_count, 1);
        assert_eq!(agg.live_window().sample_count, 2);
        assert_eq!(agg.rollup_window().sample_count, 2);
    }

    #[test]
    fn live_record_carries_latest_instantaneous() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.on_cycle(&cycle(1.0, false, 1000));
        agg.on_cycle(&cycle(0.5, false, 1500));

        match agg.live_record(RunStatus::Running) {
            TelemetryRecord::Live {
                cycle_time,
                cpm,
                good_path_count,
                ..
            } => {
                assert_eq!(cycle_time, 0.5);
                assert_eq!(cpm, 120.0);
                assert_eq!(good_path_count, 2);
            }
            _ => panic!("expected live record"),
        }
    }

    #[test]
    fn commit_resets_live_window_only() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.on_cycle(&cycle(1.0, false, 1000));

        agg.commit_live(2000);
        assert_eq!(agg.live_window().sample_count, 0);
        // Rollup window is untouched — no double counting, no loss
        assert_eq!(agg.rollup_window().sample_count, 1);
    }

    #[test]
    fn defer_keeps_counts_but_closes_interval() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.on_cycle(&cycle(1.0, false, 1000));

        assert!(agg.live_due(2000));
        agg.defer_live(2000);
        assert!(!agg.live_due(2500));
        assert_eq!(agg.live_window().good_count, 1);
    }

    #[test]
    fn rollup_means_are_sample_averages() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.on_cycle(&cycle(1.0, false, 1000));
        agg.on_cycle(&cycle(2.0, false, 3000));

        match agg.rollup_record(30_000).unwrap() {
            TelemetryRecord::Rollup {
                cycle_time, cpm, ..
            } => {
                assert_eq!(cycle_time, 1.5);
                assert_eq!(cpm, 45.0); // (60 + 30) / 2
            }
            _ => panic!("expected rollup record"),
        }
    }

    #[test]
    fn empty_rollup_window_is_skipped() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.tick_elapsed(RunStatus::Stopped, 2000);

        assert!(agg.rollup_due(30_000));
        assert!(agg.rollup_record(30_000).is_none());
        // Skip restarts the window so it is not immediately due again
        assert!(!agg.rollup_due(30_100));
    }

    #[test]
    fn elapsed_time_follows_run_state() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);

        for _ in 0..3 {
            agg.tick_elapsed(RunStatus::Running, 1000);
        }
        agg.tick_elapsed(RunStatus::Stopped, 1000);

        assert_eq!(agg.live_window().run_secs(), 3);
        assert_eq!(agg.live_window().stop_secs(), 1);
        assert_eq!(agg.rollup_window().run_secs(), 3);
    }

    #[test]
    fn stop_zeroes_instantaneous_readings() {
        let mut agg = Aggregator::new(machine(), 2000, 30_000);
        agg.on_cycle(&cycle(1.0, false, 1000));
        agg.on_status(RunStatus::Stopped);

        match agg.live_record(RunStatus::Stopped) {
            TelemetryRecord::Live {
                cycle_time,
                cpm,
                good_path_count,
                ..
            } => {
                assert_eq!(cycle_time, 0.0);
                assert_eq!(cpm, 0.0);
                // Counts survive; only the instantaneous pair is zeroed
                assert_eq!(good_path_count, 1);
            }
            _ => panic!("expected live record"),
        }
    }
}
