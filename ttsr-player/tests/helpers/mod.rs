//! Test helper modules for ttsr-player integration tests
//!
//! - ScriptedTransport: per-connection scripts of inbound frames
//! - RecordingFallback: fallback synth that records what it was asked to say
//! - audio_generator: PCM16 payloads with known content
//! - Harness: a session wired to a scripted transport and a timer-driven
//!   device renderer

#![allow(dead_code)]

pub mod audio_generator;
pub mod scripted_transport;

pub use audio_generator::{pcm16_sine, pcm16_silence};
pub use scripted_transport::{RecordingFallback, ScriptedTransport, Step};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use ttsr_common::{EventBus, ReaderEvent, SessionState};
use ttsr_player::config::PlaybackConfig;
use ttsr_player::playback::{build_playout, DeviceClock, StretchParams};
use ttsr_player::session::{SessionOptions, StreamRequest};
use ttsr_player::Session;

/// Device rate used by the harness renderer
pub const DEVICE_RATE: u32 = 16000;

/// Source rate assumed by harness sessions
pub const SOURCE_RATE: u32 = 22050;

/// Text every harness session asks for
pub const TEXT: &str = "The quick brown fox jumps over the lazy dog.";

/// Device callback period simulated by the driver task
const RENDER_PERIOD: Duration = Duration::from_millis(10);

pub fn options() -> SessionOptions {
    SessionOptions {
        request: StreamRequest::for_text(TEXT),
        fallback_text: Some(TEXT.to_string()),
        source_sample_rate: SOURCE_RATE,
        reconnect_backoff: Duration::from_millis(1500),
        first_audio_timeout: Duration::from_secs(10),
        send_tempo_to_source: false,
        tick: Duration::from_millis(10),
    }
}

/// A started session plus everything around it
pub struct Harness {
    pub session: Session,
    pub clock: Arc<DeviceClock>,
    pub transport: Arc<ScriptedTransport>,
    pub fallback: Arc<RecordingFallback>,
    pub events: broadcast::Receiver<ReaderEvent>,
    driver: JoinHandle<()>,
}

impl Harness {
    /// Build and start a session; must run inside a tokio runtime
    pub fn start(scripts: Vec<Vec<Step>>, options: SessionOptions) -> Self {
        let playout = build_playout(DEVICE_RATE, &PlaybackConfig::default(), &StretchParams::default());
        let clock = Arc::clone(&playout.device);
        let transport = Arc::new(ScriptedTransport::new(scripts));
        let fallback = Arc::new(RecordingFallback::default());
        let bus = EventBus::new(1024);
        let events = bus.subscribe();

        let mut renderer = playout.renderer;
        let driver = tokio::spawn(async move {
            let mut interval = tokio::time::interval(RENDER_PERIOD);
            let mut block = vec![0.0f32; (DEVICE_RATE as u64 * RENDER_PERIOD.as_millis() as u64 / 1000) as usize];
            loop {
                interval.tick().await;
                renderer.render(&mut block);
            }
        });

        let mut session = Session::new(
            options,
            playout.scheduler,
            playout.tempo,
            Arc::clone(&transport) as _,
            Arc::clone(&fallback) as _,
            bus,
        );
        session.start().expect("session starts");

        Self {
            session,
            clock,
            transport,
            fallback,
            events,
            driver,
        }
    }

    /// Wait for the first event matching `pred`
    pub async fn wait_for<F>(&mut self, within: Duration, pred: F) -> Option<ReaderEvent>
    where
        F: Fn(&ReaderEvent) -> bool,
    {
        wait_for_event(&mut self.events, within, pred).await
    }

    /// Wait until the session reaches `state`
    pub async fn wait_for_state(&self, state: SessionState, within: Duration) -> bool {
        wait_until(within, || self.session.state() == state).await
    }

    /// Drain already-delivered events
    pub fn drain_events(&mut self) -> Vec<ReaderEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.session.stop();
        self.driver.abort();
    }
}

pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<ReaderEvent>,
    within: Duration,
    pred: F,
) -> Option<ReaderEvent>
where
    F: Fn(&ReaderEvent) -> bool,
{
    tokio::time::timeout(within, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Poll `cond` every 10 ms until it holds or `within` elapses
pub async fn wait_until<F>(within: Duration, cond: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
