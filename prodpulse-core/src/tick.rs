//! Lock-Free Debounce Latch for the Cycle Sensor Edge
//!
//! ## Overview
//!
//! This module turns a possibly-bouncing falling-edge signal into a single
//! logical tick per physical machine cycle. It is the only piece of the
//! pipeline that runs in interrupt context, so it follows ISR rules
//! strictly: set a flag, record a timestamp, nothing else. No logging, no
//! allocation, no blocking.
//!
//! ## Why Lock-Free?
//!
//! The latch is shared between the interrupt handler (producer) and the
//! 10 ms polling task (consumer). A mutex here would risk priority
//! inversion against the ISR, so the latch is a single-producer /
//! single-consumer cell built from two atomics:
//!
//! ```text
//! ISR (edge fires)                 Polling task
//!      ↓                                ↓
//!  offer(now) ── tick_ms, pending ──→ take()
//!      ↓          (Release)  (Acquire)  ↓
//!  never blocks                    clears pending
//! ```
//!
//! Single-writer discipline: the ISR path is the only writer of the
//! timestamp and the only setter of the pending flag; the task is the only
//! clearer. The timestamp is stored with Release *before* the flag is set,
//! and read with Acquire *after* the flag is observed, so the consumer
//! never sees a flag without its timestamp.
//!
//! ## Debounce Contract
//!
//! An edge is accepted only if
//! 1. more than `debounce_ms` elapsed since the last *accepted* edge, and
//! 2. no tick is currently pending consumption.
//!
//! Everything else is hardware bounce and is dropped silently — that is the
//! contract, not a defect. Because accepted ticks are always separated by
//! more than the debounce interval, the classifier can never observe a
//! zero cycle duration from this latch.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::time::Timestamp;

/// Default debounce interval in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u32 = 50;

/// Debounced edge latch shared between ISR and polling task
///
/// `const fn new` allows placing the latch in a `static`, which is how the
/// ISR reaches it on embedded targets:
///
/// ```rust
/// use prodpulse_core::tick::EdgeDebouncer;
///
/// static LATCH: EdgeDebouncer = EdgeDebouncer::new(50);
///
/// // interrupt handler
/// fn cycle_sensor_isr(now_ms: u64) {
///     LATCH.offer(now_ms);
/// }
///
/// // polling task
/// fn poll(now_ms: u64) {
///     if let Some(tick) = LATCH.take() {
///         // classify the tick
///         let _ = tick;
///     }
/// }
/// ```
pub struct EdgeDebouncer {
    /// Tick waiting for the classifier (ISR sets, task clears)
    pending: AtomicBool,
    /// Timestamp of the pending tick (ISR writes before setting `pending`)
    tick_ms: AtomicU64,
    /// Timestamp of the last accepted edge (ISR-owned)
    last_accepted: AtomicU64,
    /// Whether any edge has been accepted yet (ISR-owned)
    armed: AtomicBool,
    /// Debounce interval in milliseconds
    debounce_ms: AtomicU32,
    /// Edges rejected by the debounce window or the pending latch
    bounced: AtomicU32,
}

impl EdgeDebouncer {
    /// Create a new latch with the given debounce interval
    ///
    /// Can be used in a `static` context.
    pub const fn new(debounce_ms: u32) -> Self {
        Self {
            pending: AtomicBool::new(false),
            tick_ms: AtomicU64::new(0),
            last_accepted: AtomicU64::new(0),
            armed: AtomicBool::new(false),
            debounce_ms: AtomicU32::new(debounce_ms),
            bounced: AtomicU32::new(0),
        }
    }

    /// Offer a raw edge from interrupt context
    ///
    /// Returns true if the edge was accepted as a tick. Safe to call from
    /// an ISR: two loads, at most three stores, no other work.
    ///
    /// ## Safety contract
    /// Must only be called from a single producer context (the edge ISR).
    pub fn offer(&self, now: Timestamp) -> bool {
        let last = self.last_accepted.load(Ordering::Relaxed);
        let debounce = self.debounce_ms.load(Ordering::Relaxed) as u64;

        // Strictly greater-than: an edge exactly on the window boundary is
        // still bounce. The very first edge has no window to fall into.
        let within_window =
            self.armed.load(Ordering::Relaxed) && now.saturating_sub(last) <= debounce;

        if within_window || self.pending.load(Ordering::Acquire) {
            self.bounced.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.armed.store(true, Ordering::Relaxed);
        self.last_accepted.store(now, Ordering::Relaxed);
        // Timestamp must be visible before the flag
        self.tick_ms.store(now, Ordering::Release);
        self.pending.store(true, Ordering::Release);
        true
    }

    /// Consume the pending tick, if any
    ///
    /// Called from the polling task. Clearing the flag here (and only here)
    /// is what re-arms the latch for the next physical event.
    pub fn take(&self) -> Option<Timestamp> {
        if !self.pending.load(Ordering::Acquire) {
            return None;
        }

        let tick = self.tick_ms.load(Ordering::Acquire);
        self.pending.store(false, Ordering::Release);
        Some(tick)
    }

    /// Check whether a tick is waiting without consuming it
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Update the debounce interval (configuration change boundary)
    pub fn set_debounce_ms(&self, debounce_ms: u32) {
        self.debounce_ms.store(debounce_ms, Ordering::Relaxed);
    }

    /// Edges dropped by debounce or the pending latch
    pub fn bounced(&self) -> u32 {
        self.bounced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_spaced_edges() {
        let latch = EdgeDebouncer::new(50);

        assert!(latch.offer(1000));
        assert_eq!(latch.take(), Some(1000));

        assert!(latch.offer(1100));
        assert_eq!(latch.take(), Some(1100));
        assert_eq!(latch.bounced(), 0);
    }

    #[test]
    fn drops_bounce_within_window() {
        let latch = EdgeDebouncer::new(50);

        assert!(latch.offer(1000));
        assert_eq!(latch.take(), Some(1000));

        // Bounce train 10-50ms after the accepted edge
        assert!(!latch.offer(1010));
        assert!(!latch.offer(1030));
        assert!(!latch.offer(1050)); // boundary is still bounce
        assert_eq!(latch.take(), None);
        assert_eq!(latch.bounced(), 3);

        // Past the window
        assert!(latch.offer(1051));
        assert_eq!(latch.take(), Some(1051));
    }

    #[test]
    fn holds_edge_while_pending() {
        let latch = EdgeDebouncer::new(50);

        assert!(latch.offer(1000));
        assert!(latch.is_pending());

        // Second physical event before the task consumed the first
        assert!(!latch.offer(2000));
        assert_eq!(latch.bounced(), 1);

        assert_eq!(latch.take(), Some(1000));
        assert!(latch.offer(2100));
        assert_eq!(latch.take(), Some(2100));
    }

    #[test]
    fn take_is_idempotent_when_empty() {
        let latch = EdgeDebouncer::new(50);
        assert_eq!(latch.take(), None);
        assert_eq!(latch.take(), None);
    }
}
