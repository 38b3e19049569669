//! ttsr-player specific configuration
//!
//! Loaded from TOML (see `ttsr_common::config` for file resolution). Every
//! field has a compiled default, so an empty or missing file is valid.

use crate::error::{Error, Result};
use crate::playback::scheduler::UnitBoundary;
use crate::playback::tempo::{StretchParams, TEMPO_MAX, TEMPO_MIN};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use ttsr_common::FadeCurve;

/// Default rate of the synthesis source when it never announces one
pub const DEFAULT_SOURCE_SAMPLE_RATE: u32 = 22050;

/// Complete player configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlayerConfig {
    pub stream: StreamConfig,
    pub playback: PlaybackConfig,
    pub tempo: StretchParams,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

/// Network stream settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint of the synthesis source
    pub url: String,
    /// Source PCM rate assumed until a `hello`/`ready`/`mark` announces one
    pub source_sample_rate: u32,
    /// Fixed delay before reconnecting after a mid-stream drop
    pub reconnect_backoff_ms: u64,
    /// Abandon an attempt that has delivered no audio after this long
    pub first_audio_timeout_ms: u64,
    /// Also send tempo changes to the source as a prosody control message
    pub send_tempo_to_source: bool,
    /// Period of the network-side housekeeping tick
    pub tick_ms: u64,
    /// Voice name forwarded in the stream request
    pub voice: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/api/stream".to_string(),
            source_sample_rate: DEFAULT_SOURCE_SAMPLE_RATE,
            reconnect_backoff_ms: 1500,
            first_audio_timeout_ms: 10_000,
            send_tempo_to_source: false,
            tick_ms: 10,
            voice: None,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn first_audio_timeout(&self) -> Duration {
        Duration::from_millis(self.first_audio_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Local playback settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,
    /// Ring buffer capacity in seconds of device-rate audio
    pub buffer_seconds: f32,
    /// Fade / overlap length at unit boundaries
    pub fade_ms: f32,
    pub fade_curve: FadeCurve,
    pub unit_boundary: UnitBoundary,
    /// Initial tempo (clamped on use)
    pub tempo: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_seconds: 2.0,
            fade_ms: 15.0,
            fade_curve: FadeCurve::Linear,
            unit_boundary: UnitBoundary::Mark,
            tempo: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Ring capacity in samples at `sample_rate`
    pub fn buffer_capacity(&self, sample_rate: u32) -> usize {
        ((self.buffer_seconds as f64 * sample_rate as f64).ceil() as usize).max(1)
    }

    /// Fade length in samples at `sample_rate`
    pub fn fade_len(&self, sample_rate: u32) -> usize {
        (self.fade_ms as f64 * sample_rate as f64 / 1000.0).round() as usize
    }
}

/// Local fallback voice settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Speech program; text is written to its stdin
    pub program: String,
    /// Arguments; `{rate}` and `{wpm}` are substituted
    pub args: Vec<String>,
    /// Words per minute at tempo 1.0
    pub base_wpm: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "espeak-ng".to_string(),
            args: vec!["-s".to_string(), "{wpm}".to_string(), "--stdin".to_string()],
            base_wpm: 175,
        }
    }
}

/// Logging settings (overridden by RUST_LOG)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration, falling back to defaults when no file exists
    ///
    /// # Arguments
    /// * `path` - Explicit config path from the command line, if any
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: PlayerConfig =
            ttsr_common::config::load_or_default(path, ttsr_common::config::CONFIG_ENV_VAR)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PlayerConfig = ttsr_common::config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.stream.source_sample_rate == 0 {
            return Err(Error::Config("stream.source_sample_rate must be > 0".to_string()));
        }
        if !(self.playback.buffer_seconds > 0.0) {
            return Err(Error::Config("playback.buffer_seconds must be > 0".to_string()));
        }
        if !(self.playback.fade_ms >= 0.0) {
            return Err(Error::Config("playback.fade_ms must be >= 0".to_string()));
        }
        if !self.playback.tempo.is_finite() {
            return Err(Error::Config("playback.tempo must be a number".to_string()));
        }
        if self.playback.tempo < TEMPO_MIN || self.playback.tempo > TEMPO_MAX {
            tracing::warn!(
                "playback.tempo {} outside [{}, {}], will be clamped",
                self.playback.tempo, TEMPO_MIN, TEMPO_MAX
            );
        }
        self.tempo.validate()?;
        Ok(())
    }
}
