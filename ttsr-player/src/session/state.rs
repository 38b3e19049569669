//! Atomic session state shared between the UI context and the session task

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use ttsr_common::SessionState;

/// Session state cell
///
/// Transitions are compare-and-swap so that a UI call and the session task
/// never both win the same transition.
#[derive(Debug, Clone)]
pub struct SharedSessionState {
    inner: Arc<AtomicU8>,
}

impl SharedSessionState {
    pub fn new(initial: SessionState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial.as_u8())),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Move `from` → `to`; false if the current state is not `from`
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.inner
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `to` from any state in `from`, returning the previous state
    pub fn transition_from_any(&self, from: &[SessionState], to: SessionState) -> Option<SessionState> {
        let result = self
            .inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&SessionState::from_u8(current))
                    .then_some(to.as_u8())
            });
        result.ok().map(SessionState::from_u8)
    }

    /// Unconditionally store `to`, returning the previous state
    pub fn force(&self, to: SessionState) -> SessionState {
        SessionState::from_u8(self.inner.swap(to.as_u8(), Ordering::AcqRel))
    }
}
