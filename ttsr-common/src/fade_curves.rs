//! Fade curve implementations for chunk-boundary envelopes
//!
//! Provides the gain ramps applied at the start and end of every scheduled
//! audio unit. Consecutive units overlap by the fade length, so a fade-out
//! and the following fade-in are summed into one continuous envelope.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Fade curve types for chunk stitching
///
/// - Linear: constant rate of change; a linear fade-out summed with a linear
///   fade-in over the same span is exactly unity gain
/// - EqualPower: constant perceived loudness across the overlap
/// - SCurve: smooth acceleration and deceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = sin(t × π/2)
    EqualPower,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "scurve", alias = "cosine")]
    SCurve,
}

impl FadeCurve {
    /// Calculate fade-in multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Gain to apply to the sample (0.0 = silence, 1.0 = full level)
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
        }
    }

    /// Calculate fade-out multiplier at given position
    ///
    /// Mirror image of [`FadeCurve::calculate_fade_in`]: 1.0 at the start of
    /// the fade, 0.0 at the end.
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
        }
    }

    /// Ramp the head of `samples` up from silence over `fade_len` samples.
    ///
    /// Sample `i` gets the gain at position `(i + 1) / fade_len`, which pairs
    /// with [`FadeCurve::apply_fade_out`] so that a linear overlap of the two
    /// sums to exactly 1.0. If `samples` is shorter than the fade, only the
    /// covered part of the ramp is applied.
    pub fn apply_fade_in(&self, samples: &mut [f32], fade_len: usize) {
        if fade_len == 0 {
            return;
        }
        let n = fade_len.min(samples.len());
        for (i, sample) in samples[..n].iter_mut().enumerate() {
            *sample *= self.calculate_fade_in((i + 1) as f32 / fade_len as f32);
        }
    }

    /// Ramp the tail of `samples` down to silence.
    ///
    /// The ramp is aligned so that the last sample of `samples` sits at the
    /// end of a `fade_len`-long fade.
    pub fn apply_fade_out(&self, samples: &mut [f32], fade_len: usize) {
        if fade_len == 0 {
            return;
        }
        let n = fade_len.min(samples.len());
        let start = samples.len() - n;
        let offset = fade_len - n;
        for (i, sample) in samples[start..].iter_mut().enumerate() {
            let position = (offset + i + 1) as f32 / fade_len as f32;
            *sample *= self.calculate_fade_out(position);
        }
    }

    /// Parse curve from a configuration string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            _ => None,
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::EqualPower => "Equal Power",
            FadeCurve::SCurve => "S-Curve",
        }
    }

    /// Get all available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::EqualPower, FadeCurve::SCurve]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
