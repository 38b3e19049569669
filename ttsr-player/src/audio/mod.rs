//! Audio data handling: wire decoding, rate conversion, device output

pub mod decode;
pub mod output;
pub mod resampler;
pub mod types;

pub use decode::{ChunkDecoder, DecodeError};
pub use output::CpalOutput;
pub use resampler::Resampler;
pub use types::AudioChunk;
