//! Pitch-preserving tempo processing (WSOLA time stretch)
//!
//! Sits between the ring buffer and the device in the real-time context. The
//! device pulls frames; the processor pulls from its own source as needed and
//! re-times the audio by overlap-adding fixed-length sequences taken at a
//! tempo-scaled stride. Each new sequence is aligned to the previous one by
//! searching a small window for the best waveform match, which keeps pitch
//! unchanged.
//!
//! Per output sequence of `sequence - overlap` frames the processor consumes
//! on average `tempo × (sequence - overlap)` input frames, so the output
//! duration is `input duration / tempo`.

use crate::error::{Error, Result};
use crate::playback::FrameSource;
use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Slowest supported tempo
pub const TEMPO_MIN: f32 = 0.5;

/// Fastest supported tempo
pub const TEMPO_MAX: f32 = 3.0;

/// Clamp a requested tempo into `[TEMPO_MIN, TEMPO_MAX]`.
///
/// Returns `None` for NaN; infinities clamp to the nearest bound.
pub fn clamp_tempo(tempo: f32) -> Option<f32> {
    if tempo.is_nan() {
        return None;
    }
    Some(tempo.clamp(TEMPO_MIN, TEMPO_MAX))
}

/// Current tempo multiplier, shared across contexts
///
/// Written by the session (UI context), read by the processor once per
/// sequence and by the scheduler when computing durations.
#[derive(Debug, Clone)]
pub struct TempoState {
    value: Arc<AtomicF32>,
}

impl TempoState {
    pub fn new(initial: f32) -> Self {
        Self {
            value: Arc::new(AtomicF32::new(clamp_tempo(initial).unwrap_or(1.0))),
        }
    }

    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Set the tempo (clamped) and return the effective value
    ///
    /// NaN leaves the current tempo unchanged.
    pub fn set(&self, tempo: f32) -> f32 {
        match clamp_tempo(tempo) {
            Some(clamped) => {
                self.value.store(clamped, Ordering::Relaxed);
                clamped
            }
            None => self.get(),
        }
    }
}

impl Default for TempoState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Time-stretch window parameters (`[tempo]` config section)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchParams {
    /// Length of each processed sequence
    pub sequence_ms: f32,
    /// Range searched for the best-matching overlap position
    pub seek_window_ms: f32,
    /// Crossfade length between consecutive sequences
    pub overlap_ms: f32,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            sequence_ms: 40.0,
            seek_window_ms: 15.0,
            overlap_ms: 8.0,
        }
    }
}

impl StretchParams {
    /// Reject non-positive windows and sequences too short for two overlaps
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("sequence_ms", self.sequence_ms),
            ("seek_window_ms", self.seek_window_ms),
            ("overlap_ms", self.overlap_ms),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("tempo.{} must be > 0", name)));
            }
        }
        if self.sequence_ms < 2.0 * self.overlap_ms {
            return Err(Error::Config(format!(
                "tempo.sequence_ms ({}) must be at least twice tempo.overlap_ms ({})",
                self.sequence_ms, self.overlap_ms
            )));
        }
        Ok(())
    }

    /// Window sizes in frames at `sample_rate`: (sequence, seek, overlap)
    fn frames(&self, sample_rate: u32) -> (usize, usize, usize) {
        let to_frames = |ms: f32| (ms as f64 * sample_rate as f64 / 1000.0).round() as usize;
        let overlap = to_frames(self.overlap_ms).max(1);
        let sequence = to_frames(self.sequence_ms).max(2 * overlap);
        let seek = to_frames(self.seek_window_ms).max(1);
        (sequence, seek, overlap)
    }
}

/// Pull-driven tempo processor wrapping a [`FrameSource`]
pub struct TempoProcessor<S: FrameSource> {
    source: S,
    tempo: TempoState,
    sequence: usize,
    seek: usize,
    overlap: usize,
    /// Pending input frames, oldest first
    input: Vec<f32>,
    /// Processed frames not yet handed to the device
    output: VecDeque<f32>,
    /// Tail of the previous sequence, crossfaded into the next
    mid: Vec<f32>,
    has_mid: bool,
    skip_fract: f64,
}

impl<S: FrameSource> TempoProcessor<S> {
    pub fn new(source: S, tempo: TempoState, params: &StretchParams, sample_rate: u32) -> Self {
        let (sequence, seek, overlap) = params.frames(sample_rate);
        let max_required = Self::required_for(TEMPO_MAX, sequence, seek, overlap);
        // A drop from the fastest to the slowest tempo drains a full input
        // buffer at the smallest stride in one pass
        let stride = sequence - overlap;
        let min_skip = ((TEMPO_MIN as f64 * stride as f64).floor() as usize).max(1);
        let max_output = (max_required / min_skip + 1) * stride;

        debug!(
            "Tempo processor: sequence={} seek={} overlap={} frames @ {}Hz",
            sequence, seek, overlap, sample_rate
        );

        Self {
            source,
            tempo,
            sequence,
            seek,
            overlap,
            input: Vec::with_capacity(max_required * 2),
            output: VecDeque::with_capacity(max_output),
            mid: vec![0.0; overlap],
            has_mid: false,
            skip_fract: 0.0,
        }
    }

    pub fn tempo(&self) -> &TempoState {
        &self.tempo
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Most source frames pulled ahead of the frames already handed out
    pub fn read_ahead(&self) -> usize {
        Self::required_for(TEMPO_MAX, self.sequence, self.seek, self.overlap) + self.sequence
    }

    /// Input frames needed before one sequence can be produced
    fn required_for(tempo: f32, sequence: usize, seek: usize, overlap: usize) -> usize {
        let nominal_skip = tempo as f64 * (sequence - overlap) as f64;
        (nominal_skip.round() as usize + overlap).max(sequence) + seek
    }

    /// Produce as many sequences as the buffered input allows
    fn process_available(&mut self) {
        loop {
            let tempo = self.tempo.get();
            let required = Self::required_for(tempo, self.sequence, self.seek, self.overlap);
            if self.input.len() < required {
                return;
            }

            let offset = if self.has_mid { self.best_offset() } else { 0 };
            let body_end = offset + self.sequence - self.overlap;

            if self.has_mid {
                let ovl = self.overlap as f32;
                for i in 0..self.overlap {
                    let t = i as f32 / ovl;
                    let mixed = self.mid[i] * (1.0 - t) + self.input[offset + i] * t;
                    self.output.push_back(mixed);
                }
                self.output
                    .extend(self.input[offset + self.overlap..body_end].iter().copied());
            } else {
                self.output.extend(self.input[offset..body_end].iter().copied());
            }

            self.mid
                .copy_from_slice(&self.input[body_end..body_end + self.overlap]);
            self.has_mid = true;

            self.skip_fract += tempo as f64 * (self.sequence - self.overlap) as f64;
            let skip = (self.skip_fract.floor() as usize).min(self.input.len());
            self.skip_fract -= skip as f64;
            self.input.drain(..skip);
        }
    }

    /// Offset in `0..seek` whose overlap window best matches `mid`
    ///
    /// Normalized cross-correlation; the window energy is updated
    /// incrementally as the window slides.
    fn best_offset(&self) -> usize {
        let ovl = self.overlap;
        let mut energy: f32 = self.input[..ovl].iter().map(|x| x * x).sum();
        let mut best = 0;
        let mut best_score = f32::MIN;

        for offset in 0..self.seek {
            if offset > 0 {
                let leaving = self.input[offset - 1];
                let entering = self.input[offset + ovl - 1];
                energy = (energy - leaving * leaving + entering * entering).max(0.0);
            }

            let corr: f32 = self.mid
                .iter()
                .zip(&self.input[offset..offset + ovl])
                .map(|(a, b)| a * b)
                .sum();
            let score = corr / (energy + 1e-9).sqrt();

            if score > best_score {
                best_score = score;
                best = offset;
            }
        }

        best
    }

    /// Pull enough source frames to complete the next sequence
    fn pull_input(&mut self) -> usize {
        let tempo = self.tempo.get();
        let required = Self::required_for(tempo, self.sequence, self.seek, self.overlap);
        let wanted = required.saturating_sub(self.input.len()).max(1);

        let start = self.input.len();
        self.input.resize(start + wanted, 0.0);
        let got = self.source.extract(&mut self.input[start..], wanted);
        self.input.truncate(start + got);
        got
    }
}

impl<S: FrameSource> FrameSource for TempoProcessor<S> {
    fn extract(&mut self, target: &mut [f32], frame_count: usize) -> usize {
        let frame_count = frame_count.min(target.len());
        let mut written = 0;

        while written < frame_count {
            if self.output.is_empty() {
                self.process_available();
            }
            if self.output.is_empty() {
                if self.pull_input() == 0 {
                    break;
                }
                continue;
            }

            let n = (frame_count - written).min(self.output.len());
            for (slot, sample) in target[written..written + n]
                .iter_mut()
                .zip(self.output.drain(..n))
            {
                *slot = sample;
            }
            written += n;
        }

        written
    }

    fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
        self.mid.fill(0.0);
        self.has_mid = false;
        self.skip_fract = 0.0;
        self.source.reset();
    }
}
