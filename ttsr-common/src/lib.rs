//! # TTS Reader Common Library
//!
//! Shared code for the streaming reader crates including:
//! - Configuration file resolution and loading
//! - Event types (ReaderEvent enum) and the EventBus
//! - Session state enumeration
//! - Fade curve definitions and calculations

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;

pub use error::{Error, Result};
pub use events::{EventBus, ReaderEvent, SessionState};
pub use fade_curves::FadeCurve;
