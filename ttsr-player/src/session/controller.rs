//! Stream session controller
//!
//! One [`Session`] per listening request. The session owns a background task
//! (network context) that connects, decodes, resamples and schedules audio,
//! and reacts to connection loss:
//!
//! - Loss before any audio on an attempt → fallback synthesis, no reconnect
//! - Loss after audio → one reconnect after a fixed backoff
//! - Normal close after audio → end of stream; wait for the device to drain
//!
//! `pause`, `resume`, `stop` and `set_tempo` are called from the UI context.
//! They switch state with atomic transitions, flip device flags directly and
//! forward control messages to the task over a channel.

use crate::audio::decode::ChunkDecoder;
use crate::audio::resampler::Resampler;
use crate::audio::types::AudioChunk;
use crate::audio::DecodeError;
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::playback::device::OutputDevice;
use crate::playback::ring_buffer::{RingMonitor, RingStats};
use crate::playback::scheduler::{PlaybackScheduler, PlaybackTimeline};
use crate::playback::tempo::TempoState;
use crate::session::fallback::FallbackSynth;
use crate::session::protocol::{ControlMessage, SourceMessage, StreamRequest};
use crate::session::state::SharedSessionState;
use crate::session::transport::{Closure, Connection, Inbound, Transport};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use ttsr_common::{EventBus, ReaderEvent, SessionState};
use uuid::Uuid;

/// Upper bound on waiting for a transport to acknowledge close
const CLOSE_TIMEOUT: Duration = Duration::from_millis(250);

/// Session parameters
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Sent on every (re)connect
    pub request: StreamRequest,
    /// Spoken by the fallback if streaming fails; defaults to `request.text`
    pub fallback_text: Option<String>,
    /// Assumed source rate until one is announced
    pub source_sample_rate: u32,
    pub reconnect_backoff: Duration,
    pub first_audio_timeout: Duration,
    pub send_tempo_to_source: bool,
    pub tick: Duration,
}

impl SessionOptions {
    pub fn from_config(stream: &StreamConfig, request: StreamRequest) -> Self {
        let mut request = request;
        if request.voice.is_none() {
            request.voice = stream.voice.clone();
        }
        Self {
            fallback_text: request.text.clone(),
            request,
            source_sample_rate: stream.source_sample_rate,
            reconnect_backoff: stream.reconnect_backoff(),
            first_audio_timeout: stream.first_audio_timeout(),
            send_tempo_to_source: stream.send_tempo_to_source,
            tick: stream.tick(),
        }
    }
}

/// Session diagnostics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub state: SessionState,
    pub attempts: u64,
    pub reconnects: u64,
    pub chunks_received: u64,
    pub decode_errors: u64,
    pub fallback_invocations: u64,
    pub next_time: f64,
    pub units_scheduled: u64,
    pub buffer: RingStats,
}

#[derive(Debug, Default)]
struct SessionCounters {
    attempts: AtomicU64,
    reconnects: AtomicU64,
    chunks: AtomicU64,
    decode_errors: AtomicU64,
    fallbacks: AtomicU64,
}

/// UI → task messages
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Pause,
    Resume,
    Tempo(f32),
}

/// UI-side context shared with the task
#[derive(Clone)]
struct Shared {
    id: Uuid,
    state: SharedSessionState,
    destroyed: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: EventBus,
    counters: Arc<SessionCounters>,
    tempo: TempoState,
    device: Arc<dyn OutputDevice>,
    /// Listener asked for a pause that has not been resumed
    listener_paused: Arc<AtomicBool>,
    /// Between a drop after audio and the next attempt's first audio
    reconnecting: Arc<AtomicBool>,
}

impl Shared {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn emit_state(&self, old_state: SessionState, new_state: SessionState) {
        info!("Session {}: {} -> {}", self.id, old_state, new_state);
        self.events.emit_lossy(ReaderEvent::SessionStateChanged {
            session_id: self.id,
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self.state.transition(from, to);
        if moved {
            self.emit_state(from, to);
        }
        moved
    }

    fn transition_from_any(&self, from: &[SessionState], to: SessionState) -> Option<SessionState> {
        let previous = self.state.transition_from_any(from, to);
        if let Some(old) = previous {
            self.emit_state(old, to);
        }
        previous
    }
}

/// Streaming playback session
pub struct Session {
    shared: Shared,
    options: SessionOptions,
    timeline: PlaybackTimeline,
    buffer: RingMonitor,
    commands: mpsc::UnboundedSender<Command>,
    pending: Option<SessionTask>,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Create an idle session around a scheduler
    ///
    /// The scheduler's renderer half must already be attached to a device
    /// (or a test driver); the session only feeds the ring.
    pub fn new(
        options: SessionOptions,
        scheduler: PlaybackScheduler,
        tempo: TempoState,
        transport: Arc<dyn Transport>,
        fallback: Arc<dyn FallbackSynth>,
        events: EventBus,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let shared = Shared {
            id: Uuid::new_v4(),
            state: SharedSessionState::new(SessionState::Idle),
            destroyed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            events,
            counters: Arc::new(SessionCounters::default()),
            tempo,
            device: Arc::clone(scheduler.device()),
            listener_paused: Arc::new(AtomicBool::new(false)),
            reconnecting: Arc::new(AtomicBool::new(false)),
        };
        let timeline = scheduler.timeline();
        let buffer = scheduler.buffer_monitor();

        let pending = SessionTask {
            shared: shared.clone(),
            options: options.clone(),
            scheduler,
            transport,
            fallback,
            commands: commands_rx,
            decoder: ChunkDecoder::new(),
            source_rate: options.source_sample_rate,
        };

        Self {
            shared,
            options,
            timeline,
            buffer,
            commands,
            pending: Some(pending),
            handle: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Idle → Connecting; spawns the network task
    ///
    /// # Errors
    /// `Error::InvalidState` if already started or stopped
    pub fn start(&mut self) -> Result<()> {
        if self.shared.is_destroyed() {
            return Err(Error::InvalidState("session was stopped".to_string()));
        }
        let task = self
            .pending
            .take()
            .ok_or_else(|| Error::InvalidState("session already started".to_string()))?;

        if !self.shared.transition(SessionState::Idle, SessionState::Connecting) {
            return Err(Error::InvalidState(format!(
                "cannot start from {}",
                self.shared.state.get()
            )));
        }

        info!("Session {} starting", self.shared.id);
        self.handle = Some(tokio::spawn(task.run()));
        Ok(())
    }

    /// Streaming → Paused
    ///
    /// Suspends local output immediately and asks the source to pause.
    /// While reconnecting after a drop the state stays Connecting, but output
    /// is suspended and the reconnect comes back Paused. Returns false (no-op)
    /// from any other state.
    pub fn pause(&self) -> bool {
        if self.shared.transition(SessionState::Streaming, SessionState::Paused) {
            self.shared.listener_paused.store(true, Ordering::SeqCst);
            self.shared.device.suspend();
            let _ = self.commands.send(Command::Pause);
            return true;
        }

        if self.is_reconnecting() && !self.shared.listener_paused.swap(true, Ordering::SeqCst) {
            self.shared.device.suspend();
            let _ = self.commands.send(Command::Pause);
            // The new connection may have gone live in between
            self.shared.transition(SessionState::Streaming, SessionState::Paused);
            debug!("Output paused while reconnecting");
            return true;
        }

        debug!("pause ignored in state {}", self.shared.state.get());
        false
    }

    /// Paused → Streaming; also lifts a pause taken while reconnecting
    pub fn resume(&self) -> bool {
        if self.shared.transition(SessionState::Paused, SessionState::Streaming) {
            self.shared.listener_paused.store(false, Ordering::SeqCst);
            self.shared.device.resume();
            let _ = self.commands.send(Command::Resume);
            return true;
        }

        if self.is_reconnecting() && self.shared.listener_paused.swap(false, Ordering::SeqCst) {
            self.shared.device.resume();
            let _ = self.commands.send(Command::Resume);
            self.shared.transition(SessionState::Paused, SessionState::Streaming);
            debug!("Output resumed while reconnecting");
            return true;
        }

        debug!("resume ignored in state {}", self.shared.state.get());
        false
    }

    fn is_reconnecting(&self) -> bool {
        self.shared.state.get() == SessionState::Connecting
            && self.shared.reconnecting.load(Ordering::SeqCst)
    }

    /// Any → Closed
    ///
    /// Cancels any reconnect, closes the transport, flushes local output.
    /// Idempotent.
    pub fn stop(&self) {
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let old = self.shared.state.force(SessionState::Closed);
        if old != SessionState::Closed {
            self.shared.emit_state(old, SessionState::Closed);
        }
        self.shared.cancel.cancel();
        self.shared.device.stop();
        // The task may already be gone (drained or fell back)
        let now = self.shared.device.current_time();
        self.timeline.reset_to(now);
        debug!("Session {} stopped, timeline at {:.3}s", self.shared.id, now);
    }

    /// Set the playback tempo (clamped to the supported range)
    ///
    /// Returns the effective tempo. Forwarded to the source only when
    /// prosody control is enabled.
    pub fn set_tempo(&self, tempo: f32) -> f32 {
        if self.shared.is_destroyed() {
            return self.shared.tempo.get();
        }
        let effective = self.shared.tempo.set(tempo);
        debug!("Tempo set to {:.2} (requested {})", effective, tempo);
        if self.options.send_tempo_to_source {
            let _ = self.commands.send(Command::Tempo(effective));
        }
        effective
    }

    pub fn tempo(&self) -> f32 {
        self.shared.tempo.get()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.shared.events.subscribe()
    }

    pub fn next_time(&self) -> f64 {
        self.timeline.next_time()
    }

    pub fn buffer_stats(&self) -> RingStats {
        self.buffer.stats()
    }

    pub fn stats(&self) -> SessionStats {
        let counters = &self.shared.counters;
        SessionStats {
            state: self.state(),
            attempts: counters.attempts.load(Ordering::Relaxed),
            reconnects: counters.reconnects.load(Ordering::Relaxed),
            chunks_received: counters.chunks.load(Ordering::Relaxed),
            decode_errors: counters.decode_errors.load(Ordering::Relaxed),
            fallback_invocations: counters.fallbacks.load(Ordering::Relaxed),
            next_time: self.next_time(),
            units_scheduled: self.timeline.units_started(),
            buffer: self.buffer_stats(),
        }
    }

    /// Wait for the network task to finish
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

/// Per-attempt bookkeeping
#[derive(Debug)]
struct ConnectionAttempt {
    number: u32,
    opened_at: Instant,
    audio_received: bool,
}

/// How an attempt ended
#[derive(Debug, PartialEq)]
enum AttemptOutcome {
    /// Session stopped
    Cancelled,
    /// Ended before any audio on this attempt
    Failed(String),
    /// Dropped after audio
    Dropped(String),
    /// Normal close after audio
    Finished,
}

/// Network-side state, moved into the spawned task
struct SessionTask {
    shared: Shared,
    options: SessionOptions,
    scheduler: PlaybackScheduler,
    transport: Arc<dyn Transport>,
    fallback: Arc<dyn FallbackSynth>,
    commands: mpsc::UnboundedReceiver<Command>,
    decoder: ChunkDecoder,
    source_rate: u32,
}

impl SessionTask {
    async fn run(mut self) {
        let mut number = 0u32;

        loop {
            if self.shared.is_destroyed() {
                break;
            }
            number += 1;
            self.shared.counters.attempts.fetch_add(1, Ordering::Relaxed);

            match self.run_attempt(number).await {
                AttemptOutcome::Cancelled => {
                    self.scheduler.stop();
                    break;
                }
                AttemptOutcome::Failed(reason) => {
                    info!("Attempt {} failed before audio: {}", number, reason);
                    self.run_fallback().await;
                    break;
                }
                AttemptOutcome::Dropped(reason) => {
                    warn!("Stream dropped after audio (attempt {}): {}", number, reason);
                    if !self.prepare_reconnect(number) || !self.backoff().await {
                        self.scheduler.stop();
                        break;
                    }
                }
                AttemptOutcome::Finished => {
                    self.drain().await;
                    break;
                }
            }
        }

        debug!("Session {} task finished", self.shared.id);
    }

    async fn run_attempt(&mut self, number: u32) -> AttemptOutcome {
        let mut attempt = ConnectionAttempt {
            number,
            opened_at: Instant::now(),
            audio_received: false,
        };
        let deadline = tokio::time::sleep(self.options.first_audio_timeout);
        tokio::pin!(deadline);

        let connected = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => return AttemptOutcome::Cancelled,
            _ = &mut deadline => return AttemptOutcome::Failed("connect timed out".to_string()),
            result = self.transport.connect() => result,
        };
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => return AttemptOutcome::Failed(e.to_string()),
        };

        if let Err(reason) =
            send_request(conn.as_mut(), &self.options.request, self.listener_paused()).await
        {
            close_quietly(conn.as_mut()).await;
            return AttemptOutcome::Failed(reason);
        }

        let mut tick = tokio::time::interval(self.options.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => break AttemptOutcome::Cancelled,
                command = self.commands.recv() => match command {
                    Some(command) => send_control(conn.as_mut(), command).await,
                    None => break AttemptOutcome::Cancelled,
                },
                inbound = conn.recv() => match inbound {
                    Inbound::Binary(data) => {
                        let decoded = self.decoder.decode(&data, self.source_rate);
                        self.accept_chunk(decoded, &mut attempt);
                    }
                    Inbound::Text(text) => self.handle_text(&text, &mut attempt),
                    Inbound::Closed(closure) => {
                        debug!(
                            "Attempt {} closed after {:?}: {:?}",
                            attempt.number,
                            attempt.opened_at.elapsed(),
                            closure
                        );
                        return match (closure, attempt.audio_received) {
                            (Closure::Finished, false) => {
                                AttemptOutcome::Failed("closed before any audio".to_string())
                            }
                            (Closure::Dropped(reason), false) => AttemptOutcome::Failed(reason),
                            (Closure::Finished, true) => AttemptOutcome::Finished,
                            (Closure::Dropped(reason), true) => AttemptOutcome::Dropped(reason),
                        };
                    }
                },
                _ = tick.tick() => self.flush_held_tail(),
                _ = &mut deadline, if !attempt.audio_received => {
                    break AttemptOutcome::Failed(format!(
                        "no audio within {:?}",
                        self.options.first_audio_timeout
                    ));
                }
            }
        };

        close_quietly(conn.as_mut()).await;
        outcome
    }

    fn handle_text(&mut self, text: &str, attempt: &mut ConnectionAttempt) {
        let message = SourceMessage::parse(text);
        if let Some(rate) = message.announced_rate() {
            if rate != self.source_rate {
                debug!("Source sample rate {} -> {}", self.source_rate, rate);
                self.source_rate = rate;
            }
        }

        match message {
            SourceMessage::Hello { sample_rate } => {
                self.emit_ready(None, sample_rate);
            }
            SourceMessage::Ready { doc_id, sample_rate } => {
                self.emit_ready(doc_id, sample_rate);
            }
            SourceMessage::Mark {
                sentence_id,
                seq,
                status,
                ..
            } => {
                self.scheduler.mark();
                trace!("Mark {} ({:?})", sentence_id, status);
                self.shared.events.emit_lossy(ReaderEvent::SentenceMark {
                    session_id: self.shared.id,
                    sentence_id,
                    seq,
                    status,
                    timestamp: chrono::Utc::now(),
                });
            }
            SourceMessage::Audio { pcm16_base64, .. } => {
                let decoded = self.decoder.decode_base64(&pcm16_base64, self.source_rate);
                self.accept_chunk(decoded, attempt);
            }
            SourceMessage::Unknown => trace!("Ignoring text frame: {}", text),
        }
    }

    fn emit_ready(&self, doc_id: Option<String>, sample_rate: Option<u32>) {
        self.shared.events.emit_lossy(ReaderEvent::SourceReady {
            session_id: self.shared.id,
            doc_id,
            sample_rate,
            timestamp: chrono::Utc::now(),
        });
    }

    fn accept_chunk(
        &mut self,
        decoded: std::result::Result<AudioChunk, DecodeError>,
        attempt: &mut ConnectionAttempt,
    ) {
        let chunk = match decoded {
            Ok(chunk) => chunk,
            Err(e) => {
                let errors = self.shared.counters.decode_errors.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Dropping malformed chunk ({} so far): {}", errors, e);
                return;
            }
        };
        if self.shared.is_destroyed() {
            return;
        }

        let device_rate = self.shared.device.sample_rate();
        let samples = Resampler::resample(&chunk.samples, chunk.sample_rate, device_rate);
        let start = self.scheduler.schedule(&samples);
        self.shared.counters.chunks.fetch_add(1, Ordering::Relaxed);
        trace!(
            "Chunk {} ({} samples @ {}Hz) scheduled at {:.3}s",
            chunk.seq,
            chunk.len(),
            chunk.sample_rate,
            start
        );

        if !attempt.audio_received {
            attempt.audio_received = true;
            self.shared.reconnecting.store(false, Ordering::SeqCst);
            let target = if self.listener_paused() {
                SessionState::Paused
            } else {
                SessionState::Streaming
            };
            if self.shared.transition(SessionState::Connecting, target) {
                // The listener may have flipped the flag while this was under way
                match (target, self.listener_paused()) {
                    (SessionState::Streaming, true) => {
                        self.shared.transition(SessionState::Streaming, SessionState::Paused);
                    }
                    (SessionState::Paused, false) => {
                        self.shared.transition(SessionState::Paused, SessionState::Streaming);
                    }
                    _ => {}
                }
            }
        }
    }

    fn listener_paused(&self) -> bool {
        self.shared.listener_paused.load(Ordering::SeqCst)
    }

    /// Hand the held tail to the ring before the renderer can run dry
    ///
    /// The next look is one tick away, so the horizon is now plus a tick.
    fn flush_held_tail(&mut self) {
        let horizon = self.shared.device.current_time() + self.options.tick.as_secs_f64();
        self.scheduler.flush_if_due(horizon);
    }

    /// Streaming/Paused → Connecting; false if the session is gone
    fn prepare_reconnect(&mut self, number: u32) -> bool {
        if self.shared.is_destroyed() {
            return false;
        }
        self.shared.reconnecting.store(true, Ordering::SeqCst);
        match self
            .shared
            .transition_from_any(&[SessionState::Streaming, SessionState::Paused], SessionState::Connecting)
        {
            Some(previous) => {
                debug!(
                    "Reconnecting from {} (listener paused: {})",
                    previous,
                    self.listener_paused()
                );
                self.shared.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                let delay = self.options.reconnect_backoff;
                info!("Reconnecting in {:?} (after attempt {})", delay, number);
                self.shared.events.emit_lossy(ReaderEvent::ReconnectScheduled {
                    session_id: self.shared.id,
                    attempt: number + 1,
                    delay_ms: delay.as_millis() as u64,
                    timestamp: chrono::Utc::now(),
                });
                true
            }
            None => {
                self.shared.reconnecting.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Sleep out the reconnect backoff, keeping the held tail flowing
    ///
    /// Returns false if the session was stopped meanwhile.
    async fn backoff(&mut self) -> bool {
        let wake = tokio::time::sleep(self.options.reconnect_backoff);
        tokio::pin!(wake);
        let mut tick = tokio::time::interval(self.options.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => return false,
                _ = &mut wake => return !self.shared.is_destroyed(),
                command = self.commands.recv() => {
                    if command.is_none() {
                        return false;
                    }
                }
                _ = tick.tick() => self.flush_held_tail(),
            }
        }
    }

    async fn run_fallback(&mut self) {
        let Some(_) = self.shared.transition_from_any(
            &[SessionState::Connecting, SessionState::Streaming, SessionState::Paused],
            SessionState::Degraded,
        ) else {
            return;
        };

        let tempo = self.shared.tempo.get();
        self.shared.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.shared.events.emit_lossy(ReaderEvent::FallbackStarted {
            session_id: self.shared.id,
            tempo,
            timestamp: chrono::Utc::now(),
        });

        let text = self.options.fallback_text.clone().unwrap_or_default();
        let success = if text.trim().is_empty() {
            warn!("No text available for fallback synthesis");
            false
        } else {
            info!("Falling back to local synthesis ({} chars, tempo {:.2})", text.len(), tempo);
            tokio::select! {
                _ = self.shared.cancel.cancelled() => false,
                result = self.fallback.speak(&text, tempo) => match result {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Fallback synthesis failed: {}", e);
                        false
                    }
                },
            }
        };

        self.shared.events.emit_lossy(ReaderEvent::FallbackFinished {
            session_id: self.shared.id,
            success,
            timestamp: chrono::Utc::now(),
        });
    }

    /// End of stream: flush the tail and wait for the device to play it out
    async fn drain(&mut self) {
        self.scheduler.finish();
        info!(
            "Source finished after {} chunks",
            self.shared.counters.chunks.load(Ordering::Relaxed)
        );
        self.shared.events.emit_lossy(ReaderEvent::SourceFinished {
            session_id: self.shared.id,
            chunks_received: self.shared.counters.chunks.load(Ordering::Relaxed),
            timestamp: chrono::Utc::now(),
        });

        let end = self.scheduler.end_time();
        let mut tick = tokio::time::interval(self.options.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => {
                    self.scheduler.stop();
                    return;
                }
                command = self.commands.recv() => {
                    if command.is_none() {
                        return;
                    }
                }
                _ = tick.tick() => {
                    if self.shared.device.current_time() >= end {
                        debug!("Playback drained at {:.3}s", end);
                        self.shared.events.emit_lossy(ReaderEvent::PlaybackDrained {
                            session_id: self.shared.id,
                            timestamp: chrono::Utc::now(),
                        });
                        return;
                    }
                }
            }
        }
    }
}

async fn send_request(
    conn: &mut dyn Connection,
    request: &StreamRequest,
    paused: bool,
) -> std::result::Result<(), String> {
    let request = serde_json::to_string(request).map_err(|e| e.to_string())?;
    conn.send_text(request).await.map_err(|e| e.to_string())?;

    if paused {
        let pause = serde_json::to_string(&ControlMessage::Pause).map_err(|e| e.to_string())?;
        conn.send_text(pause).await.map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn send_control(conn: &mut dyn Connection, command: Command) {
    let message = match command {
        Command::Pause => ControlMessage::Pause,
        Command::Resume => ControlMessage::Resume,
        Command::Tempo(value) => ControlMessage::tempo(value),
    };
    match serde_json::to_string(&message) {
        Ok(text) => {
            if let Err(e) = conn.send_text(text).await {
                debug!("Control message {:?} not sent: {}", message, e);
            }
        }
        Err(e) => warn!("Control message {:?} not encoded: {}", message, e),
    }
}

async fn close_quietly(conn: &mut dyn Connection) {
    if tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await.is_err() {
        debug!("Transport close timed out");
    }
}
