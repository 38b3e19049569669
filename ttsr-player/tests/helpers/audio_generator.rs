//! PCM16 payload generation
//!
//! Produces wire-format (signed 16-bit little-endian mono) payloads with
//! known length and content.

use std::f32::consts::PI;

/// Number of samples in `duration_ms` at `sample_rate`
pub fn samples_for(duration_ms: u64, sample_rate: u32) -> usize {
    (sample_rate as u64 * duration_ms / 1000) as usize
}

/// Sine tone payload
pub fn pcm16_sine(duration_ms: u64, sample_rate: u32, freq_hz: f32, amplitude: f32) -> Vec<u8> {
    let count = samples_for(duration_ms, sample_rate);
    (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let value = (2.0 * PI * freq_hz * t).sin() * amplitude;
            (value * i16::MAX as f32) as i16
        })
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

/// Silent payload
pub fn pcm16_silence(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    vec![0u8; samples_for(duration_ms, sample_rate) * 2]
}
