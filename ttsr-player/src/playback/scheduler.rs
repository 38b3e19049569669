//! Crossfading playback scheduler
//!
//! Network-side owner of the ring buffer's producer half. Places each decoded,
//! resampled chunk at `max(next_time, device.current_time())` and advances
//! `next_time` by the scheduled duration at the current tempo.
//!
//! **Stitching:** audio is grouped into units. Every unit gets a fade-in at its
//! head and a fade-out at its tail, and the last `fade_len` samples of a unit
//! are held back so they can be summed with the next unit's head. Adjacent
//! units therefore overlap by exactly the fade length, which is also the
//! amount `next_time` is pulled back at each boundary.
//!
//! What counts as a unit is [`UnitBoundary`]: each chunk, or everything
//! between two sentence marks.
//!
//! `next_time` is non-decreasing; only [`PlaybackScheduler::stop`] resets it.

use crate::playback::device::OutputDevice;
use crate::playback::ring_buffer::{RingMonitor, RingProducer, RingStats};
use crate::playback::tempo::TempoState;
use atomic_float::AtomicF64;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use ttsr_common::FadeCurve;

/// Where one crossfaded unit ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitBoundary {
    /// Every chunk is its own unit
    Chunk,
    /// Chunks between sentence marks are appended contiguously
    #[default]
    Mark,
}

/// Shared view of the scheduling timeline
///
/// The scheduler writes it; sessions and UIs read it.
#[derive(Debug, Clone)]
pub struct PlaybackTimeline {
    next_time: Arc<AtomicF64>,
    units: Arc<AtomicU64>,
}

impl PlaybackTimeline {
    pub fn new(start: f64) -> Self {
        Self {
            next_time: Arc::new(AtomicF64::new(start)),
            units: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Device time at which the next scheduled audio will start
    pub fn next_time(&self) -> f64 {
        self.next_time.load(Ordering::Acquire)
    }

    /// Units started since creation
    pub fn units_started(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }

    /// Restart the timeline at `now`
    ///
    /// Used when playback is torn down after the scheduler itself is gone.
    pub fn reset_to(&self, now: f64) {
        self.set_next_time(now);
    }

    fn set_next_time(&self, value: f64) {
        self.next_time.store(value, Ordering::Release);
    }
}

/// Chunk scheduler feeding the ring buffer
pub struct PlaybackScheduler {
    producer: RingProducer,
    device: Arc<dyn OutputDevice>,
    tempo: TempoState,
    timeline: PlaybackTimeline,
    sample_rate: u32,
    fade_len: usize,
    curve: FadeCurve,
    boundary: UnitBoundary,
    /// Input frames the renderer side may pull ahead of what it has played
    read_ahead: usize,
    /// Last `fade_len` samples of the current or previous unit, not yet written
    tail: Vec<f32>,
    /// Whether `tail` already carries its fade-out
    tail_faded: bool,
    in_unit: bool,
    staging: Vec<f32>,
}

impl PlaybackScheduler {
    pub fn new(
        producer: RingProducer,
        device: Arc<dyn OutputDevice>,
        tempo: TempoState,
        fade_len: usize,
        curve: FadeCurve,
        boundary: UnitBoundary,
    ) -> Self {
        let sample_rate = device.sample_rate().max(1);
        let timeline = PlaybackTimeline::new(device.current_time());

        debug!(
            "Playback scheduler: {}Hz, fade {} samples ({}), units per {:?}",
            sample_rate, fade_len, curve, boundary
        );

        Self {
            producer,
            device,
            tempo,
            timeline,
            sample_rate,
            fade_len,
            curve,
            boundary,
            read_ahead: 0,
            tail: Vec::with_capacity(fade_len),
            tail_faded: false,
            in_unit: false,
            staging: Vec::new(),
        }
    }

    /// Set how far ahead of playback the consumer reads from the ring
    ///
    /// The held tail is flushed this much earlier than `next_time` so that
    /// the ring never runs dry in front of it.
    pub fn set_read_ahead(&mut self, frames: usize) {
        self.read_ahead = frames;
    }

    pub fn read_ahead(&self) -> usize {
        self.read_ahead
    }

    /// Schedule one chunk of device-rate samples
    ///
    /// Returns the start time of the chunk's audio on the device timeline.
    pub fn schedule(&mut self, samples: &[f32]) -> f64 {
        let start = if self.in_unit {
            self.append(samples)
        } else {
            self.begin_unit(samples)
        };

        if self.boundary == UnitBoundary::Chunk {
            self.close_unit();
        }
        start
    }

    /// A sentence mark arrived; ends the current unit in `Mark` mode
    pub fn mark(&mut self) {
        if self.boundary == UnitBoundary::Mark && self.in_unit {
            self.close_unit();
        }
    }

    /// Write out the held tail before the consumer reaches the end of the ring
    ///
    /// `horizon` is the latest device time the caller may not look again
    /// before. The tail goes out once `horizon` plus the read-ahead at the
    /// current tempo reaches `next_time`. Returns true if a tail was flushed.
    pub fn flush_if_due(&mut self, horizon: f64) -> bool {
        if self.tail.is_empty() {
            return false;
        }
        let due = self.timeline.next_time() - self.duration_of(self.read_ahead);
        if horizon < due {
            return false;
        }
        trace!("Flushing held tail at {:.3}s (due {:.3}s)", horizon, due);
        self.flush_tail();
        true
    }

    /// End of stream: fade and write the held tail
    pub fn finish(&mut self) {
        if !self.tail.is_empty() {
            self.flush_tail();
        }
        self.in_unit = false;
    }

    /// Discard held audio, flush the device and restart the timeline at the
    /// device's current time
    pub fn stop(&mut self) {
        self.tail.clear();
        self.tail_faded = false;
        self.in_unit = false;
        self.device.stop();
        self.timeline.set_next_time(self.device.current_time());
        debug!("Scheduler stopped, timeline reset to {:.3}s", self.timeline.next_time());
    }

    pub fn next_time(&self) -> f64 {
        self.timeline.next_time()
    }

    /// Device time at which everything scheduled so far will have played
    pub fn end_time(&self) -> f64 {
        self.timeline.next_time() + self.duration_of(self.tail.len())
    }

    pub fn timeline(&self) -> PlaybackTimeline {
        self.timeline.clone()
    }

    pub fn device(&self) -> &Arc<dyn OutputDevice> {
        &self.device
    }

    pub fn buffer_stats(&self) -> RingStats {
        self.producer.stats()
    }

    pub fn buffer_monitor(&self) -> RingMonitor {
        self.producer.monitor()
    }

    pub fn fade_len(&self) -> usize {
        self.fade_len
    }

    pub fn held_samples(&self) -> usize {
        self.tail.len()
    }

    fn begin_unit(&mut self, samples: &[f32]) -> f64 {
        self.staging.clear();
        self.staging.extend_from_slice(samples);
        self.curve.apply_fade_in(&mut self.staging, self.fade_len);

        if !self.tail.is_empty() {
            if !self.tail_faded {
                self.curve.apply_fade_out(&mut self.tail, self.fade_len);
            }
            for (i, &held) in self.tail.iter().enumerate() {
                match self.staging.get_mut(i) {
                    Some(sample) => *sample += held,
                    None => self.staging.push(held),
                }
            }
            self.tail.clear();
        }

        let start = self.timeline.next_time().max(self.device.current_time());
        self.timeline.set_next_time(start);
        self.timeline.units.fetch_add(1, Ordering::Relaxed);
        self.in_unit = true;
        self.tail_faded = false;

        self.commit_staging();
        trace!(
            "Unit started at {:.3}s ({} samples, next {:.3}s)",
            start,
            samples.len(),
            self.timeline.next_time()
        );
        start
    }

    fn append(&mut self, samples: &[f32]) -> f64 {
        let start = self.timeline.next_time();
        self.staging.clear();
        self.staging.extend_from_slice(&self.tail);
        self.staging.extend_from_slice(samples);
        self.tail.clear();

        self.commit_staging();
        start
    }

    /// Write all of `staging` except the last `fade_len` samples, which
    /// become the new held tail
    fn commit_staging(&mut self) {
        let keep = self.fade_len.min(self.staging.len());
        let split = self.staging.len() - keep;

        let accepted = self.producer.write(&self.staging[..split]);
        self.tail.extend_from_slice(&self.staging[split..]);
        self.advance(accepted);
    }

    fn close_unit(&mut self) {
        if !self.tail_faded {
            self.curve.apply_fade_out(&mut self.tail, self.fade_len);
            self.tail_faded = true;
        }
        self.in_unit = false;
    }

    fn flush_tail(&mut self) {
        self.close_unit();
        let accepted = self.producer.write(&self.tail);
        self.tail.clear();
        self.tail_faded = false;
        self.advance(accepted);
    }

    fn advance(&self, samples: usize) {
        let next = self.timeline.next_time() + self.duration_of(samples);
        self.timeline.set_next_time(next);
    }

    /// Playback duration of `samples` device-rate samples at the current tempo
    fn duration_of(&self, samples: usize) -> f64 {
        samples as f64 / (self.sample_rate as f64 * self.tempo.get() as f64)
    }
}
