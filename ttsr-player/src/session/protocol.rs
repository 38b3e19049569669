//! JSON messages exchanged with the synthesis source
//!
//! Outbound: one [`StreamRequest`] right after connecting, then
//! [`ControlMessage`]s. Inbound text frames parse as [`SourceMessage`];
//! anything unrecognized becomes `SourceMessage::Unknown` and is ignored.

use serde::{Deserialize, Serialize};

/// First message on a new connection: what to read and how
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl StreamRequest {
    /// Request synthesis of literal text
    pub fn for_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Request a prepared document
    pub fn for_document(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: Some(doc_id.into()),
            ..Self::default()
        }
    }
}

/// Client → source control messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Prosody rate change; `tempo` and `rate` carry the same value
    Control { tempo: f32, rate: f32 },
    Pause,
    Resume,
}

impl ControlMessage {
    pub fn tempo(value: f32) -> Self {
        ControlMessage::Control {
            tempo: value,
            rate: value,
        }
    }
}

/// Source → client text frames
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceMessage {
    Hello {
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    Ready {
        #[serde(default)]
        doc_id: Option<String>,
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    /// Sentence boundary; `status` is `done`, `rate_limited` or `empty`
    Mark {
        sentence_id: String,
        #[serde(default)]
        seq: Option<u64>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        sample_rate: Option<u32>,
        #[serde(default)]
        num_samples: Option<u64>,
    },
    /// Base64 PCM16 chunk carried in a text frame
    Audio {
        pcm16_base64: String,
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    #[serde(other)]
    Unknown,
}

impl SourceMessage {
    /// Parse a text frame; malformed JSON is treated as unknown
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or(SourceMessage::Unknown)
    }

    /// Non-zero sample rate announced by this message, if any
    pub fn announced_rate(&self) -> Option<u32> {
        let rate = match self {
            SourceMessage::Hello { sample_rate }
            | SourceMessage::Ready { sample_rate, .. }
            | SourceMessage::Mark { sample_rate, .. }
            | SourceMessage::Audio { sample_rate, .. } => *sample_rate,
            SourceMessage::Unknown => None,
        };
        rate.filter(|r| *r > 0)
    }
}
