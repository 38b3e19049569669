//! Chunk decoder for the stream wire format
//!
//! The synthesis source sends signed 16-bit little-endian mono PCM, either as
//! a binary WebSocket frame or base64-encoded inside a JSON text frame. Both
//! end up here and come out as normalized f32 samples.
//!
//! The decoder never resamples; rate conversion happens right after decode
//! using the rate announced by the source.

use crate::audio::types::AudioChunk;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// Normalization divisor for i16 samples: maps to [-1.0, 1.0)
const PCM16_SCALE: f32 = 32768.0;

/// Malformed chunk payload
///
/// The chunk is discarded and the stream continues; never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// PCM16 payloads must contain whole 2-byte samples
    #[error("PCM16 payload has odd length {0}")]
    OddLength(usize),

    /// Text-encoded payload is not valid base64
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

/// Stateful chunk decoder
///
/// Assigns arrival-order sequence numbers to successfully decoded chunks.
/// A failed decode consumes no sequence number.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    next_seq: u64,
    decoded: u64,
    rejected: u64,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw PCM16 LE payload
    ///
    /// # Arguments
    /// * `raw` - Payload bytes; N even bytes yield N/2 samples
    /// * `sample_rate` - Source rate to tag the chunk with
    ///
    /// # Errors
    /// `DecodeError::OddLength` if `raw.len()` is odd
    pub fn decode(&mut self, raw: &[u8], sample_rate: u32) -> Result<AudioChunk, DecodeError> {
        let samples = match decode_pcm16(raw) {
            Ok(samples) => samples,
            Err(e) => {
                self.rejected += 1;
                return Err(e);
            }
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.decoded += 1;
        Ok(AudioChunk::new(seq, samples, sample_rate))
    }

    /// Decode a base64 text-encoded PCM16 LE payload
    pub fn decode_base64(
        &mut self,
        encoded: &str,
        sample_rate: u32,
    ) -> Result<AudioChunk, DecodeError> {
        let raw = match BASE64.decode(encoded.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                self.rejected += 1;
                return Err(DecodeError::Base64(e.to_string()));
            }
        };
        self.decode(&raw, sample_rate)
    }

    /// Successfully decoded chunks so far
    pub fn decoded_count(&self) -> u64 {
        self.decoded
    }

    /// Rejected payloads so far
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }
}

/// Convert PCM16 LE bytes to normalized f32 samples
pub fn decode_pcm16(raw: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if raw.len() % 2 != 0 {
        return Err(DecodeError::OddLength(raw.len()));
    }

    Ok(raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect())
}
