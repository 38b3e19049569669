//! Playback pipeline: ring buffer, tempo processing, scheduling, device clock

pub mod device;
pub mod playout;
pub mod ring_buffer;
pub mod scheduler;
pub mod tempo;

pub use device::{DeviceClock, OutputDevice, PlayoutRenderer};
pub use playout::{build_playout, Playout};
pub use ring_buffer::{AudioRing, RingConsumer, RingMonitor, RingProducer, RingStats};
pub use scheduler::{PlaybackScheduler, PlaybackTimeline, UnitBoundary};
pub use tempo::{StretchParams, TempoProcessor, TempoState, TEMPO_MAX, TEMPO_MIN};

/// Pull-based source of mono frames for the real-time context.
///
/// Implementations must not block or allocate in steady state: they are
/// called from the device callback.
pub trait FrameSource: Send {
    /// Write up to `frame_count` frames into `target[..frame_count]`.
    ///
    /// Returns the number of frames written; the caller silences the rest.
    fn extract(&mut self, target: &mut [f32], frame_count: usize) -> usize;

    /// Discard all buffered audio (on stop).
    fn reset(&mut self) {}
}
