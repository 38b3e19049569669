//! Linear-interpolation sample rate conversion
//!
//! Converts mono chunks from the source rate to the device rate. Runs once
//! per chunk on the network side, before the samples reach the ring buffer.
//! No filter history is kept between chunks.

use std::borrow::Cow;
use tracing::trace;

/// Stateless mono resampler
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from `source_rate` to `target_rate`.
    ///
    /// # Returns
    /// - The input unchanged (borrowed) when the rates match, when either rate
    ///   is zero, or when the input is empty
    /// - Otherwise `max(1, floor(len × ratio))` samples, where
    ///   `ratio = target_rate / source_rate`. Output sample `i` interpolates
    ///   the input at position `i / ratio`; the right neighbour is clamped to
    ///   the last input sample. Output values never leave the input's range.
    pub fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
        if source_rate == target_rate || source_rate == 0 || target_rate == 0 || input.is_empty() {
            return Cow::Borrowed(input);
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let out_len = ((input.len() as f64 * ratio).floor() as usize).max(1);
        let last = input.len() - 1;

        let output: Vec<f32> = (0..out_len)
            .map(|i| {
                let pos = i as f64 / ratio;
                let i0 = (pos.floor() as usize).min(last);
                let i1 = (i0 + 1).min(last);
                let frac = (pos - i0 as f64) as f32;
                input[i0] + (input[i1] - input[i0]) * frac
            })
            .collect();

        trace!(
            "Resampled {} samples {}Hz -> {} samples {}Hz",
            input.len(),
            source_rate,
            output.len(),
            target_rate
        );

        Cow::Owned(output)
    }

    /// Expected output length for `input_len` samples.
    pub fn output_len(input_len: usize, source_rate: u32, target_rate: u32) -> usize {
        if source_rate == target_rate || source_rate == 0 || target_rate == 0 || input_len == 0 {
            return input_len;
        }
        let ratio = target_rate as f64 / source_rate as f64;
        ((input_len as f64 * ratio).floor() as usize).max(1)
    }
}
