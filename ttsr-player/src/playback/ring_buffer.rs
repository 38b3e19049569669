//! Lock-free sample ring buffer
//!
//! Single-producer single-consumer FIFO of mono f32 samples between the
//! network context (producer, via the scheduler) and the real-time device
//! context (consumer, via the tempo processor).
//!
//! - Overflow: the newest samples that do not fit are dropped and counted
//! - Underrun: reads are padded with silence and counted
//!
//! Neither side ever blocks. Capacity is fixed at creation.

use crate::playback::FrameSource;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Log an overflow/underrun warning every this many events
const WARN_EVERY: u64 = 1000;

/// Counters shared by both halves
#[derive(Debug, Default)]
struct RingCounters {
    written: AtomicU64,
    /// Samples that left the ring (read or flushed)
    consumed: AtomicU64,
    dropped: AtomicU64,
    overflow_events: AtomicU64,
    underrun_samples: AtomicU64,
    underrun_events: AtomicU64,
}

/// Snapshot of ring buffer health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    pub capacity: usize,
    pub occupied: usize,
    /// Samples accepted by `write`
    pub written: u64,
    /// Samples rejected by `write` because the ring was full
    pub dropped: u64,
    /// Reads that found fewer samples than requested
    pub underruns: u64,
    /// Zero samples substituted by those reads
    pub underrun_samples: u64,
}

/// Ring buffer before it is split into its two halves
pub struct AudioRing {
    buffer: HeapRb<f32>,
    counters: Arc<RingCounters>,
}

impl AudioRing {
    /// Create a ring holding exactly `capacity` samples (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating sample ring buffer with capacity: {} samples", capacity);

        Self {
            buffer: HeapRb::new(capacity),
            counters: Arc::new(RingCounters::default()),
        }
    }

    /// Split into producer and consumer halves
    ///
    /// Each half can be moved to a different thread.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = RingProducer {
            producer: prod,
            counters: Arc::clone(&self.counters),
        };
        let consumer = RingConsumer {
            consumer: cons,
            counters: self.counters,
        };

        (producer, consumer)
    }
}

/// Producer half (network context)
pub struct RingProducer {
    producer: ringbuf::HeapProd<f32>,
    counters: Arc<RingCounters>,
}

impl RingProducer {
    /// Append samples, dropping whatever does not fit
    ///
    /// Returns the number of samples accepted. Samples already in the ring
    /// are never overwritten.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let accepted = self.producer.push_slice(samples);
        self.counters
            .written
            .fetch_add(accepted as u64, Ordering::Relaxed);

        let rejected = samples.len() - accepted;
        if rejected > 0 {
            self.counters
                .dropped
                .fetch_add(rejected as u64, Ordering::Relaxed);
            let events = self.counters.overflow_events.fetch_add(1, Ordering::Relaxed) + 1;
            if events == 1 || events % WARN_EVERY == 0 {
                warn!(
                    "Sample ring overflow: dropped {} samples (events: {}, total dropped: {})",
                    rejected,
                    events,
                    self.counters.dropped.load(Ordering::Relaxed)
                );
            }
        }

        accepted
    }

    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn vacant_len(&self) -> usize {
        self.producer.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity().into()
    }

    pub fn stats(&self) -> RingStats {
        snapshot(&self.counters, self.capacity(), self.occupied_len())
    }

    /// Read-only view of the counters for other contexts
    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            counters: Arc::clone(&self.counters),
            capacity: self.capacity(),
        }
    }
}

/// Counter view that can be held away from either half
///
/// Occupancy is derived from the written and consumed totals.
#[derive(Debug, Clone)]
pub struct RingMonitor {
    counters: Arc<RingCounters>,
    capacity: usize,
}

impl RingMonitor {
    pub fn stats(&self) -> RingStats {
        let written = self.counters.written.load(Ordering::Relaxed);
        let consumed = self.counters.consumed.load(Ordering::Relaxed);
        let occupied = (written.saturating_sub(consumed) as usize).min(self.capacity);
        snapshot(&self.counters, self.capacity, occupied)
    }
}

/// Consumer half (real-time context)
pub struct RingConsumer {
    consumer: ringbuf::HeapCons<f32>,
    counters: Arc<RingCounters>,
}

impl RingConsumer {
    /// Fill `target` from the ring, padding any shortfall with silence
    ///
    /// Returns the number of real samples read.
    pub fn read(&mut self, target: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(target);
        self.counters
            .consumed
            .fetch_add(read as u64, Ordering::Relaxed);

        if read < target.len() {
            target[read..].fill(0.0);
            let missing = (target.len() - read) as u64;
            self.counters
                .underrun_samples
                .fetch_add(missing, Ordering::Relaxed);
            let events = self.counters.underrun_events.fetch_add(1, Ordering::Relaxed) + 1;
            if events % WARN_EVERY == 0 {
                warn!("Sample ring underrun (total: {})", events);
            } else {
                trace!("Sample ring underrun: padded {} samples", missing);
            }
        }

        read
    }

    /// Discard everything currently buffered
    pub fn clear(&mut self) -> usize {
        let discarded = self.consumer.clear();
        self.counters
            .consumed
            .fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }

    pub fn occupied_len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity().into()
    }

    pub fn stats(&self) -> RingStats {
        snapshot(&self.counters, self.capacity(), self.occupied_len())
    }
}

impl FrameSource for RingConsumer {
    fn extract(&mut self, target: &mut [f32], frame_count: usize) -> usize {
        let n = frame_count.min(target.len());
        self.read(&mut target[..n]);
        n
    }

    fn reset(&mut self) {
        let discarded = self.clear();
        trace!("Sample ring flushed ({} samples discarded)", discarded);
    }
}

fn snapshot(counters: &RingCounters, capacity: usize, occupied: usize) -> RingStats {
    RingStats {
        capacity,
        occupied,
        written: counters.written.load(Ordering::Relaxed),
        dropped: counters.dropped.load(Ordering::Relaxed),
        underruns: counters.underrun_events.load(Ordering::Relaxed),
        underrun_samples: counters.underrun_samples.load(Ordering::Relaxed),
    }
}
