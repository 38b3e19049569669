//! Output device abstraction and the real-time renderer
//!
//! [`DeviceClock`] is the device-side state shared between the session and
//! the real-time callback: it counts rendered frames (the device clock), and
//! carries the suspend flag and the flush request. [`PlayoutRenderer`] is the
//! callback body: it pulls frames from a [`FrameSource`] when running and
//! outputs silence when suspended.
//!
//! The renderer never blocks and never allocates.

use crate::playback::FrameSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Local audio output as seen by the scheduler and session
pub trait OutputDevice: Send + Sync {
    /// Frames per second rendered by the device
    fn sample_rate(&self) -> u32;

    /// Seconds of audio the device has played since creation
    ///
    /// Monotonic; does not advance while suspended.
    fn current_time(&self) -> f64;

    /// Halt consumption; output silence, keep buffered audio
    fn suspend(&self);

    /// Continue consumption from where it was suspended
    fn resume(&self);

    fn is_suspended(&self) -> bool;

    /// Discard all buffered audio
    fn stop(&self);
}

/// Frame-counting device clock with suspend and flush controls
#[derive(Debug)]
pub struct DeviceClock {
    sample_rate: u32,
    frames_rendered: AtomicU64,
    suspended: AtomicBool,
    flush_epoch: AtomicU64,
}

impl DeviceClock {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sample_rate: sample_rate.max(1),
            frames_rendered: AtomicU64::new(0),
            suspended: AtomicBool::new(false),
            flush_epoch: AtomicU64::new(0),
        })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    fn advance(&self, frames: usize) {
        self.frames_rendered
            .fetch_add(frames as u64, Ordering::AcqRel);
    }

    fn flush_epoch(&self) -> u64 {
        self.flush_epoch.load(Ordering::Acquire)
    }
}

impl OutputDevice for DeviceClock {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered() as f64 / self.sample_rate as f64
    }

    fn suspend(&self) {
        if !self.suspended.swap(true, Ordering::AcqRel) {
            debug!("Output suspended at {:.3}s", self.current_time());
        }
    }

    fn resume(&self) {
        if self.suspended.swap(false, Ordering::AcqRel) {
            debug!("Output resumed at {:.3}s", self.current_time());
        }
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.flush_epoch.fetch_add(1, Ordering::AcqRel);
        debug!("Output flush requested at {:.3}s", self.current_time());
    }
}

/// Real-time render loop body
///
/// Owned by the device callback (or a test driver).
pub struct PlayoutRenderer<S: FrameSource> {
    source: S,
    clock: Arc<DeviceClock>,
    seen_epoch: u64,
}

impl<S: FrameSource> PlayoutRenderer<S> {
    pub fn new(source: S, clock: Arc<DeviceClock>) -> Self {
        let seen_epoch = clock.flush_epoch();
        Self {
            source,
            clock,
            seen_epoch,
        }
    }

    /// Fill `out` with mono frames
    ///
    /// Suspended: silence, nothing pulled, clock held. A pending flush
    /// resets the source before pulling.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.clock.is_suspended() {
            out.fill(0.0);
            return;
        }

        let epoch = self.clock.flush_epoch();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.source.reset();
        }

        let frames = out.len();
        let produced = self.source.extract(out, frames);
        if produced < frames {
            out[produced..].fill(0.0);
        }
        self.clock.advance(frames);
    }

    pub fn clock(&self) -> &Arc<DeviceClock> {
        &self.clock
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
