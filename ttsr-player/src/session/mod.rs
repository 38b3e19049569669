//! Stream session: state machine, wire protocol, transport, fallback

pub mod controller;
pub mod fallback;
pub mod protocol;
pub mod state;
pub mod transport;

pub use controller::{Session, SessionOptions, SessionStats};
pub use fallback::{CommandFallback, FallbackSynth};
pub use protocol::{ControlMessage, SourceMessage, StreamRequest};
pub use state::SharedSessionState;
pub use transport::{Closure, Connection, Inbound, Transport, TransportError, WebSocketTransport};
