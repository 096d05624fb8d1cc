//! Bounded Lock-Free Queue Between Counting and Delivery
#![allow(unsafe_code)] // Required for lock-free atomic operations
//!
//! ## Overview
//!
//! This module implements the bounded single-producer / single-consumer
//! queue that decouples record production (sensor/aggregation cadence,
//! must never block) from delivery (network-bound, may stall for seconds).
//! The polling task pushes; the dispatch task pops; neither ever waits on
//! the other.
//!
//! ## Why Lock-Free?
//!
//! A mutex between the counting task and the network task would let a
//! stalled publish block cycle classification — exactly the coupling this
//! queue exists to remove. The ring uses atomic head/tail with explicit
//! ordering instead:
//!
//! ```text
//! Polling task                       Dispatch task
//!      ↓                                  ↓
//!   push() ───→ Ring Buffer ←────────── pop()
//!      ↓                                  ↓
//!  never blocks                  blocks on network only
//! ```
//!
//! Head and tail are free-running counters; slot positions are the
//! counters masked by `N - 1`, so all `N` declared slots are usable.
//!
//! ### Push (producer)
//! 1. Load head and tail; `head - tail == N` means full
//! 2. Full? Count the drop, reject the record — existing entries untouched
//! 3. Write record into `buffer[head & (N-1)]`
//! 4. Publish with a Release store of `head + 1`
//!
//! ### Pop (consumer)
//! 1. Load head with Acquire, compare with tail
//! 2. Empty? Return None
//! 3. Read record out of `buffer[tail & (N-1)]`
//! 4. Release the slot with a Release store of `tail + 1`
//!
//! ## Backpressure Policy
//!
//! Capacity is fixed and never exceeded. When the consumer cannot keep
//! pace, *new* records are rejected and counted — never silently
//! overwritten, and producers never retry. This bounds memory at the cost
//! of telemetry loss under sustained outage (see `dispatch` for the
//! matching delivery policy).
//!
//! ## Ownership
//!
//! A record moves into its ring slot on push and out to the consumer on
//! pop; the slot is the record's storage for its time in the queue. The
//! consumer destroys the record after the delivery attempt, success or
//! failure.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::record::TelemetryRecord;

/// Default queue capacity (records)
///
/// Must be a power of two so positions wrap with a mask. The declared
/// capacity is the usable capacity.
pub const QUEUE_CAPACITY: usize = 256;

const _: () = assert!(
    QUEUE_CAPACITY.is_power_of_two(),
    "Queue capacity must be power of 2"
);

/// Lock-free telemetry queue
///
/// ## Example Usage
///
/// ```rust
/// use prodpulse_core::queue::TelemetryQueue;
/// use prodpulse_core::record::{InlineString, RunStatus, TelemetryRecord};
///
/// static QUEUE: TelemetryQueue<256> = TelemetryQueue::new();
///
/// // Producer (polling task)
/// let record = TelemetryRecord::Status {
///     machine_id: InlineString::new("press_07").unwrap(),
///     status: RunStatus::Running,
/// };
/// if !QUEUE.push(record) {
///     // Dropped and counted; producers never retry
/// }
///
/// // Consumer (dispatch task)
/// while let Some(record) = QUEUE.pop() {
///     // Attempt delivery, then destroy the record either way
/// }
/// ```
pub struct TelemetryQueue<const N: usize> {
    /// Ring buffer storage
    ///
    /// UnsafeCell for interior mutability with atomics; slots are written
    /// only by the producer and read only by the consumer.
    buffer: UnsafeCell<[MaybeUninit<TelemetryRecord>; N]>,

    /// Free-running write counter (producer owned); slot is `head & (N-1)`
    head: AtomicUsize,

    /// Free-running read counter (consumer owned); slot is `tail & (N-1)`
    tail: AtomicUsize,

    /// Queue statistics
    stats: QueueStats,
}

/// Queue health counters
///
/// Tracked with Relaxed ordering; they inform diagnostics, not correctness.
pub struct QueueStats {
    /// Total records pushed
    pub pushed: AtomicU32,
    /// Total records popped
    pub popped: AtomicU32,
    /// Records dropped because the queue was full
    pub dropped: AtomicU32,
    /// Maximum queue depth seen
    pub max_depth: AtomicU32,
}

impl QueueStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            popped: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_depth: AtomicU32::new(0),
        }
    }

    fn update_max_depth(&self, current: u32) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

impl<const N: usize> TelemetryQueue<N> {
    /// Create new empty queue
    ///
    /// Can be used in static context. Capacity must be a power of two.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Queue capacity must be power of 2");
        Self {
            buffer: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            stats: QueueStats::new(),
        }
    }

    /// Push a record (single producer)
    ///
    /// Returns false if the queue is full; the record is dropped, the drop
    /// is counted, and existing entries are untouched. Never waits.
    ///
    /// ## Safety
    /// Only safe to call from a single producer task.
    pub fn push(&self, record: TelemetryRecord) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        if head.wrapping_sub(tail) == N {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "log")]
            log::warn!("telemetry queue full, record dropped");
            return false;
        }

        // Safe because we're the only producer
        unsafe {
            let buffer = &mut *self.buffer.get();
            buffer[head & (N - 1)].write(record); // Fast modulo for power of 2
        }

        // Make the slot visible before moving head
        self.head.store(head.wrapping_add(1), Ordering::Release);

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats.update_max_depth(self.len() as u32);

        true
    }

    /// Pop the next record (single consumer)
    ///
    /// Returns None if the queue is empty.
    ///
    /// ## Safety
    /// Only safe to call from a single consumer task.
    pub fn pop(&self) -> Option<TelemetryRecord> {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        // Safe because we're the only consumer and head != tail guarantees
        // the slot was initialized by a completed push
        let record = unsafe {
            let buffer = &*self.buffer.get();
            ptr::read(&buffer[tail & (N - 1)]).assume_init()
        };

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        self.stats.popped.fetch_add(1, Ordering::Relaxed);

        Some(record)
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Check if queue is full
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

// The queue handles its own synchronization between the two tasks
unsafe impl<const N: usize> Send for TelemetryQueue<N> {}
unsafe impl<const N: usize> Sync for TelemetryQueue<N> {}

impl<const N: usize> Default for TelemetryQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{InlineString, RunStatus};

    fn status_record(status: RunStatus) -> TelemetryRecord {
        TelemetryRecord::Status {
            machine_id: InlineString::new("press_07").unwrap(),
            status,
        }
    }

    #[test]
    fn queue_basic() {
        let queue = TelemetryQueue::<16>::new();

        assert!(queue.push(status_record(RunStatus::Running)));
        assert_eq!(queue.len(), 1);

        let popped = queue.pop().unwrap();
        assert!(matches!(
            popped,
            TelemetryRecord::Status {
                status: RunStatus::Running,
                ..
            }
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn capacity_two_queue_rejects_only_the_third() {
        let queue = TelemetryQueue::<2>::new();

        // The declared capacity is fully usable
        assert!(queue.push(status_record(RunStatus::Running)));
        assert!(queue.push(status_record(RunStatus::Running)));
        assert!(queue.is_full());

        assert!(!queue.push(status_record(RunStatus::Stopped)));
        assert_eq!(queue.stats().dropped.load(Ordering::Relaxed), 1);
        assert_eq!(queue.len(), 2);

        // Existing entries survive in FIFO order, untouched by the drop
        for _ in 0..2 {
            assert!(matches!(
                queue.pop().unwrap(),
                TelemetryRecord::Status {
                    status: RunStatus::Running,
                    ..
                }
            ));
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn wrapping_counters_keep_every_slot_usable() {
        let queue = TelemetryQueue::<4>::new();

        // Cycle well past one lap of the ring
        for _ in 0..10 {
            for _ in 0..4 {
                assert!(queue.push(status_record(RunStatus::Running)));
            }
            assert!(queue.is_full());
            for _ in 0..4 {
                assert!(queue.pop().is_some());
            }
            assert!(queue.is_empty());
        }
        assert_eq!(queue.stats().dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let queue = TelemetryQueue::<8>::new();

        queue.push(status_record(RunStatus::Running));
        queue.push(status_record(RunStatus::Stopped));

        assert!(matches!(
            queue.pop().unwrap(),
            TelemetryRecord::Status {
                status: RunStatus::Running,
                ..
            }
        ));
        assert!(matches!(
            queue.pop().unwrap(),
            TelemetryRecord::Status {
                status: RunStatus::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn stats_track_traffic() {
        let queue = TelemetryQueue::<8>::new();

        for _ in 0..5 {
            queue.push(status_record(RunStatus::Running));
        }
        for _ in 0..2 {
            queue.pop();
        }

        assert_eq!(queue.stats().pushed.load(Ordering::Relaxed), 5);
        assert_eq!(queue.stats().popped.load(Ordering::Relaxed), 2);
        assert_eq!(queue.stats().max_depth.load(Ordering::Relaxed), 5);
    }
}
