//! # TTS Reader Streaming Player Library (ttsr-player)
//!
//! Streams synthesized speech from a network source and plays it in near-real
//! time, with pitch-preserving tempo control, seamless pause/resume, and local
//! fallback synthesis when the stream fails before delivering audio.
//!
//! **Architecture:** two execution contexts joined by a lock-free ring buffer.
//! - Network context (tokio task): transport → decoder → resampler →
//!   scheduler → ring buffer
//! - Real-time context (device callback): ring buffer → tempo processor →
//!   device
//!
//! The [`session::Session`] object supervises both ends.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod session;

pub use error::{Error, Result};
pub use session::Session;
