//! Assembly of the playback pipeline for one output device
//!
//! ring buffer → tempo processor → renderer, with the scheduler holding the
//! producer half and the device clock shared by both contexts.

use crate::config::PlaybackConfig;
use crate::playback::device::{DeviceClock, OutputDevice, PlayoutRenderer};
use crate::playback::ring_buffer::{AudioRing, RingConsumer};
use crate::playback::scheduler::PlaybackScheduler;
use crate::playback::tempo::{StretchParams, TempoProcessor, TempoState};
use std::sync::Arc;
use tracing::info;

/// Renderer type driven by the device callback
pub type DeviceRenderer = PlayoutRenderer<TempoProcessor<RingConsumer>>;

/// Both halves of a playback pipeline
pub struct Playout {
    /// Network-side half; handed to the session
    pub scheduler: PlaybackScheduler,
    /// Real-time half; handed to the device callback
    pub renderer: DeviceRenderer,
    pub device: Arc<DeviceClock>,
    pub tempo: TempoState,
}

/// Build a pipeline rendering at `sample_rate`
pub fn build_playout(
    sample_rate: u32,
    playback: &PlaybackConfig,
    stretch: &StretchParams,
) -> Playout {
    let device = DeviceClock::new(sample_rate);
    let tempo = TempoState::new(playback.tempo);
    let capacity = playback.buffer_capacity(sample_rate);
    let fade_len = playback.fade_len(sample_rate);

    let (producer, consumer) = AudioRing::new(capacity).split();
    let processor = TempoProcessor::new(consumer, tempo.clone(), stretch, sample_rate);
    let read_ahead = processor.read_ahead();
    let renderer = PlayoutRenderer::new(processor, Arc::clone(&device));

    let mut scheduler = PlaybackScheduler::new(
        producer,
        Arc::clone(&device) as Arc<dyn OutputDevice>,
        tempo.clone(),
        fade_len,
        playback.fade_curve,
        playback.unit_boundary,
    );
    scheduler.set_read_ahead(read_ahead);

    info!(
        "Playout ready: {}Hz, ring {} samples, fade {} samples, tempo {:.2}",
        sample_rate,
        capacity,
        fade_len,
        tempo.get()
    );

    Playout {
        scheduler,
        renderer,
        device,
        tempo,
    }
}
