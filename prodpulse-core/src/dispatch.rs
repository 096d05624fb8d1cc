//! Telemetry Delivery Consumer
//!
//! ## Overview
//!
//! A single consumer owns delivery: it waits for connectivity, takes the
//! next queued record, and attempts delivery exactly once. This is the
//! only place in the pipeline that performs blocking network I/O.
//!
//! ## Failure Policy (baseline)
//!
//! On a failed attempt the record is discarded — not requeued — and the
//! caller backs off a fixed interval before the next attempt so a
//! persistently broken network cannot spin the CPU. This bounds worst-case
//! memory at the cost of telemetry loss under sustained outage; the
//! network-observed sequence is FIFO with gaps. A bounded
//! retry-with-requeue variant is a product decision, not taken here.
//!
//! ## Non-Blocking Core
//!
//! [`Dispatcher::service`] performs at most one delivery attempt and
//! returns `nb::Error::WouldBlock` while there is nothing to do (link down
//! or queue empty), so it can be driven from any executor: an RTOS task, a
//! std thread ([`Dispatcher::run_while`]), or a test loop.

use crate::errors::PipelineError;
use crate::queue::TelemetryQueue;
use crate::record::Channel;

pub use crate::config::DEFAULT_RETRY_BACKOFF_MS;

/// Poll interval while the queue is empty or the link is down, milliseconds
pub const IDLE_POLL_MS: u32 = 50;

/// Network sink for serialized records
///
/// The external collaborator boundary (connection bootstrapping, broker
/// handshakes, TLS) lives behind this trait; the pipeline only ever calls
/// it from the dispatch consumer. Implementations map a [`Channel`] to
/// their concrete topic or endpoint.
pub trait Connectivity {
    /// Whether the network link is currently up
    fn is_connected(&self) -> bool;

    /// Attempt to deliver one payload; true on acknowledged delivery
    ///
    /// Runs to completion (success, explicit failure, or the transport's
    /// own timeout); the dispatcher never cancels an in-flight attempt.
    fn publish(&mut self, channel: Channel, payload: &[u8]) -> bool;
}

/// Delivery counters, in the spirit of connection statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    /// Records delivered successfully
    pub delivered: u32,
    /// Records discarded after a failed attempt
    pub failed: u32,
}

/// Single consumer that drains the telemetry queue into a network sink
pub struct Dispatcher<'a, const N: usize, C: Connectivity> {
    queue: &'a TelemetryQueue<N>,
    link: C,
    backoff_ms: u32,
    stats: DispatchStats,
}

impl<'a, const N: usize, C: Connectivity> Dispatcher<'a, N, C> {
    /// Consumer over a shared queue and an owned network link
    pub fn new(queue: &'a TelemetryQueue<N>, link: C) -> Self {
        Self {
            queue,
            link,
            backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            stats: DispatchStats::default(),
        }
    }

    /// Set the post-failure backoff interval
    pub fn with_backoff_ms(mut self, backoff_ms: u32) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    /// Perform at most one delivery attempt
    ///
    /// - `Err(WouldBlock)`: link down or queue empty; call again later.
    /// - `Ok(channel)`: one record delivered.
    /// - `Err(Other(DeliveryFailed))`: one record consumed and discarded;
    ///   the caller should wait [`Self::backoff_ms`] before the next call.
    ///
    /// The record's storage is released unconditionally after the attempt.
    pub fn service(&mut self) -> nb::Result<Channel, PipelineError> {
        if !self.link.is_connected() {
            return Err(nb::Error::WouldBlock);
        }

        let record = self.queue.pop().ok_or(nb::Error::WouldBlock)?;
        let channel = record.channel();

        let payload = record
            .to_payload()
            .map_err(|_| nb::Error::Other(PipelineError::Serialize))?;

        if self.link.publish(channel, &payload) {
            self.stats.delivered += 1;
            #[cfg(feature = "log")]
            log::debug!("delivered {:?} record ({} bytes)", channel, payload.len());
            Ok(channel)
        } else {
            // Baseline policy: one attempt, then the record is gone
            self.stats.failed += 1;
            #[cfg(feature = "log")]
            log::warn!("delivery failed on {:?}, record discarded", channel);
            Err(nb::Error::Other(PipelineError::DeliveryFailed { channel }))
        }
    }

    /// Backoff interval the caller should honor after a failure
    pub fn backoff_ms(&self) -> u32 {
        self.backoff_ms
    }

    /// Delivery counters
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Access the underlying link
    pub fn link(&self) -> &C {
        &self.link
    }

    /// Drive `service` in a blocking loop until `keep_going` returns false
    ///
    /// Sleeps [`IDLE_POLL_MS`] while idle and the configured backoff after
    /// a failed delivery. Intended to run on its own thread.
    #[cfg(feature = "std")]
    pub fn run_while<F: FnMut() -> bool>(&mut self, mut keep_going: F) {
        use std::thread;
        use std::time::Duration;

        while keep_going() {
            match self.service() {
                Ok(_) => {}
                Err(nb::Error::WouldBlock) => {
                    thread::sleep(Duration::from_millis(IDLE_POLL_MS as u64));
                }
                Err(nb::Error::Other(_)) => {
                    thread::sleep(Duration::from_millis(self.backoff_ms as u64));
                }
            }
        }
    }
}
