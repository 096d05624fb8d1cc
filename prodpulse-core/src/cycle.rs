//! Cycle Classification from Debounced Ticks
//!
//! ## Overview
//!
//! The classifier turns the tick stream from the debounce latch into
//! classified [`Cycle`]s. It runs on the 10 ms polling task, never in
//! interrupt context.
//!
//! ## Calibration Tick
//!
//! The first tick after idle has no predecessor to diff against, so it is
//! treated as calibration: the timestamp is recorded and no Cycle is
//! emitted. The calibration flag re-arms whenever the run state machine
//! transitions to Stopped — otherwise the first cycle after a long stop
//! would report "time the machine was off" as a production cycle duration.
//! N ticks therefore always yield exactly N-1 cycles.
//!
//! ## Reject Classification
//!
//! On every accepted cycle the configured reject sensors are sampled once.
//! Active-low wiring (pull-up inputs) means a LOW read marks the cycle
//! rejected. Multiple sensors firing still classify a *single* rejected
//! cycle; each sensor's contribution is kept in a bitmask for diagnostics.

use crate::errors::{PipelineError, PipelineResult};
use crate::time::Timestamp;

/// Bit flags for reject sensors that fired during a cycle
///
/// One bit per configured sensor, in wiring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectMask(u32);

impl RejectMask {
    /// No sensor fired
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mark sensor `index` as fired
    ///
    /// The sensor count comes from configuration, so indices past the
    /// 32-bit mask are ignored rather than trusted.
    pub fn set(&mut self, index: u8) {
        if index < 32 {
            self.0 |= 1 << index;
        }
    }

    /// Check whether sensor `index` fired
    pub const fn contains(&self, index: u8) -> bool {
        index < 32 && (self.0 >> index) & 1 == 1
    }

    /// Whether any sensor fired
    pub const fn any(&self) -> bool {
        self.0 != 0
    }

    /// Number of sensors that fired
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Raw bits for diagnostics payloads
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Source of reject-sensor readings
///
/// Abstracts the ordered list of active-low digital inputs so the
/// classifier can be exercised without a device runtime. Implementations
/// sample every configured input and return the fired set; the classifier
/// calls this exactly once per classified cycle.
pub trait RejectInputs {
    /// Sample all reject sensors, returning the set that read active
    fn sample(&mut self) -> RejectMask;
}

/// Reject inputs for machines with no reject sensors wired
pub struct NoRejectInputs;

impl RejectInputs for NoRejectInputs {
    fn sample(&mut self) -> RejectMask {
        RejectMask::empty()
    }
}

/// Closure adapter for tests and host-side simulation
pub struct FnRejects<F>(pub F);

impl<F> RejectInputs for FnRejects<F>
where
    F: FnMut() -> RejectMask,
{
    fn sample(&mut self) -> RejectMask {
        (self.0)()
    }
}

/// One classified production cycle
///
/// Immutable once computed; consumed by the run state machine and the
/// aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cycle {
    /// Interval between the two ticks, seconds (always > 0)
    pub duration_s: f32,
    /// Cycles per minute, `60 / duration_s`
    pub rate_per_min: f32,
    /// Whether any reject sensor fired
    pub rejected: bool,
    /// Which reject sensors fired
    pub reject_mask: RejectMask,
    /// Timestamp of the closing tick
    pub timestamp: Timestamp,
}

/// Converts successive ticks into classified cycles
pub struct CycleClassifier {
    /// Timestamp of the previous tick, if any
    last_tick: Option<Timestamp>,
    /// Ticks discarded for non-positive duration
    faults: u32,
}

impl CycleClassifier {
    /// Classifier starting in calibration
    pub fn new() -> Self {
        Self {
            last_tick: None,
            faults: 0,
        }
    }

    /// Feed one debounced tick
    ///
    /// Returns `Ok(None)` for the calibration tick, `Ok(Some(cycle))` for a
    /// classified cycle, and `Err(InvalidDuration)` for a timing fault. A
    /// faulted tick still becomes the new reference point so the stream
    /// re-synchronizes on the next tick.
    pub fn on_tick<R: RejectInputs>(
        &mut self,
        now: Timestamp,
        rejects: &mut R,
    ) -> PipelineResult<Option<Cycle>> {
        let last = match self.last_tick {
            None => {
                // Calibration: no previous tick to diff against
                self.last_tick = Some(now);
                #[cfg(feature = "log")]
                log::info!("first tick at {}ms, machine starting", now);
                return Ok(None);
            }
            Some(last) => last,
        };

        self.last_tick = Some(now);

        let duration_s = now.saturating_sub(last) as f32 / 1000.0;
        if duration_s <= 0.0 {
            // The debouncer guarantees spacing, so this is a timing fault,
            // not production data
            self.faults = self.faults.saturating_add(1);
            return Err(PipelineError::InvalidDuration { duration_s });
        }

        let reject_mask = rejects.sample();

        Ok(Some(Cycle {
            duration_s,
            rate_per_min: 60.0 / duration_s,
            rejected: reject_mask.any(),
            reject_mask,
            timestamp: now,
        }))
    }

    /// Re-arm calibration
    ///
    /// Called when the run state machine transitions to Stopped so the
    /// next tick after idle is calibration, not a cycle spanning the stop.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }

    /// Whether the next tick will be treated as calibration
    pub fn is_calibrating(&self) -> bool {
        self.last_tick.is_none()
    }

    /// Ticks discarded for non-positive duration
    pub fn faults(&self) -> u32 {
        self.faults
    }
}

impl Default for CycleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_calibration_only() {
        let mut classifier = CycleClassifier::new();
        assert_eq!(classifier.on_tick(1000, &mut NoRejectInputs).unwrap(), None);
        assert!(!classifier.is_calibrating());
    }

    #[test]
    fn second_tick_emits_cycle() {
        let mut classifier = CycleClassifier::new();
        classifier.on_tick(1000, &mut NoRejectInputs).unwrap();

        let cycle = classifier
            .on_tick(2500, &mut NoRejectInputs)
            .unwrap()
            .unwrap();
        assert_eq!(cycle.duration_s, 1.5);
        assert_eq!(cycle.rate_per_min, 40.0);
        assert!(!cycle.rejected);
        assert_eq!(cycle.timestamp, 2500);
    }

    #[test]
    fn zero_duration_is_a_fault() {
        let mut classifier = CycleClassifier::new();
        classifier.on_tick(1000, &mut NoRejectInputs).unwrap();

        let err = classifier.on_tick(1000, &mut NoRejectInputs).unwrap_err();
        assert_eq!(err, PipelineError::InvalidDuration { duration_s: 0.0 });
        assert_eq!(classifier.faults(), 1);

        // Stream re-synchronizes on the next tick
        let cycle = classifier
            .on_tick(2000, &mut NoRejectInputs)
            .unwrap()
            .unwrap();
        assert_eq!(cycle.duration_s, 1.0);
    }

    #[test]
    fn reject_sensors_mark_single_rejected_cycle() {
        let mut classifier = CycleClassifier::new();
        classifier.on_tick(0, &mut NoRejectInputs).unwrap();

        // Two sensors firing at once is still one rejected cycle
        let mut both_fire = FnRejects(|| {
            let mut mask = RejectMask::empty();
            mask.set(0);
            mask.set(2);
            mask
        });

        let cycle = classifier.on_tick(1000, &mut both_fire).unwrap().unwrap();
        assert!(cycle.rejected);
        assert_eq!(cycle.reject_mask.count(), 2);
        assert!(cycle.reject_mask.contains(0));
        assert!(cycle.reject_mask.contains(2));
        assert!(!cycle.reject_mask.contains(1));
    }

    #[test]
    fn out_of_range_sensor_index_is_ignored() {
        let mut mask = RejectMask::empty();
        mask.set(40);

        assert!(!mask.any());
        assert!(!mask.contains(40));
        assert_eq!(mask.bits(), 0);
    }

    #[test]
    fn reset_rearms_calibration() {
        let mut classifier = CycleClassifier::new();
        classifier.on_tick(1000, &mut NoRejectInputs).unwrap();
        classifier.reset();

        assert!(classifier.is_calibrating());
        // Tick after a long idle is calibration, not a 59s cycle
        assert_eq!(
            classifier.on_tick(60_000, &mut NoRejectInputs).unwrap(),
            None
        );
    }
}
