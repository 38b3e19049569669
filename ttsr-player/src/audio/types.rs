//! Core audio data types
//!
//! Defines the unit of audio delivered by the network source.

/// One discrete unit of mono PCM audio from the network source.
///
/// Created once per decoded network message and never mutated afterwards.
/// Ownership moves into the playback pipeline, which consumes it exactly once.
///
/// **Format:**
/// - Samples are f32 in [-1.0, 1.0)
/// - Mono
/// - At the source's sample rate (not yet resampled)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Arrival order within the session (0-based, successful decodes only)
    pub seq: u64,

    /// Normalized samples
    pub samples: Vec<f32>,

    /// Source sample rate the samples were produced at
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Create a new chunk
    pub fn new(seq: u64, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            seq,
            samples,
            sample_rate,
        }
    }

    /// Number of samples (= frames; mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get duration in seconds at the source rate
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Get duration in milliseconds at the source rate
    pub fn duration_ms(&self) -> u64 {
        (self.duration_seconds() * 1000.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let chunk = AudioChunk::new(0, vec![0.0; 2205], 22050);
        assert_eq!(chunk.duration_ms(), 100);
        assert_eq!(chunk.len(), 2205);
    }

    #[test]
    fn test_zero_rate_duration_is_zero() {
        let chunk = AudioChunk::new(3, vec![0.0; 10], 0);
        assert_eq!(chunk.duration_seconds(), 0.0);
    }
}
