//! Event types for the reader event system
//!
//! Provides the session state enumeration, the `ReaderEvent` enum delivered to
//! UI/highlight sinks, and the broadcast `EventBus` that carries them.
//!
//! Events are pass-through notifications. Sentence marks are forwarded as the
//! source sends them and carry no guarantee about where audio playback is.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Streaming session state
///
/// Owned exclusively by the session controller. Other components observe it
/// (or signals derived from it) and never set it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started
    Idle,
    /// Transport opening or open, no audio received on this attempt yet
    Connecting,
    /// Audio is arriving and playing
    Streaming,
    /// Listener paused; local playback suspended
    Paused,
    /// Network stream failed before delivering audio; fallback synthesis in use
    Degraded,
    /// Explicitly stopped; terminal
    Closed,
}

impl SessionState {
    /// Numeric encoding used for atomic storage
    pub fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Connecting => 1,
            SessionState::Streaming => 2,
            SessionState::Paused => 3,
            SessionState::Degraded => 4,
            SessionState::Closed => 5,
        }
    }

    /// Decode from atomic storage; unknown values map to `Closed`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Connecting,
            2 => SessionState::Streaming,
            3 => SessionState::Paused,
            4 => SessionState::Degraded,
            _ => SessionState::Closed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Degraded => write!(f, "degraded(fallback)"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Reader event types
///
/// Broadcast via EventBus and serializable for forwarding to a UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReaderEvent {
    /// Session state changed
    SessionStateChanged {
        session_id: Uuid,
        old_state: SessionState,
        new_state: SessionState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Source announced itself (`hello` / `ready`)
    SourceReady {
        session_id: Uuid,
        doc_id: Option<String>,
        sample_rate: Option<u32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sentence boundary mark from the source
    ///
    /// Used by highlight sinks. Best-effort: delivered when the mark arrives
    /// from the network, not when the sentence is heard.
    SentenceMark {
        session_id: Uuid,
        sentence_id: String,
        seq: Option<u64>,
        status: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport dropped mid-stream; a reconnect is scheduled
    ReconnectScheduled {
        session_id: Uuid,
        attempt: u32,
        delay_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fallback synthesis started
    FallbackStarted {
        session_id: Uuid,
        tempo: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fallback synthesis completed or failed
    FallbackFinished {
        session_id: Uuid,
        success: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Source closed the stream normally after delivering audio
    SourceFinished {
        session_id: Uuid,
        chunks_received: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Device has played out everything that was scheduled
    PlaybackDrained {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReaderEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ReaderEvent::SessionStateChanged { .. } => "SessionStateChanged",
            ReaderEvent::SourceReady { .. } => "SourceReady",
            ReaderEvent::SentenceMark { .. } => "SentenceMark",
            ReaderEvent::ReconnectScheduled { .. } => "ReconnectScheduled",
            ReaderEvent::FallbackStarted { .. } => "FallbackStarted",
            ReaderEvent::FallbackFinished { .. } => "FallbackFinished",
            ReaderEvent::SourceFinished { .. } => "SourceFinished",
            ReaderEvent::PlaybackDrained { .. } => "PlaybackDrained",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ReaderEvent::SessionStateChanged { session_id, .. }
            | ReaderEvent::SourceReady { session_id, .. }
            | ReaderEvent::SentenceMark { session_id, .. }
            | ReaderEvent::ReconnectScheduled { session_id, .. }
            | ReaderEvent::FallbackStarted { session_id, .. }
            | ReaderEvent::FallbackFinished { session_id, .. }
            | ReaderEvent::SourceFinished { session_id, .. }
            | ReaderEvent::PlaybackDrained { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for reader events
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// emitter; the network task never waits on a UI.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReaderEvent,
    ) -> Result<usize, broadcast::error::SendError<ReaderEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReaderEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
