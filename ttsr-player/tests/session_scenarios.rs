//! End-to-end session behaviour against a scripted source
//!
//! All tests run on paused tokio time, so backoffs and deadlines are exact
//! and the simulated device clock advances in lockstep with the timers.

mod helpers;

use helpers::{options, pcm16_sine, Harness, Step, DEVICE_RATE, SOURCE_RATE, TEXT};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use ttsr_common::{ReaderEvent, SessionState};
use ttsr_player::playback::OutputDevice;
use ttsr_player::session::Closure;

fn chunk_100ms() -> Step {
    Step::Binary(pcm16_sine(100, SOURCE_RATE, 220.0, 0.3))
}

#[tokio::test(start_paused = true)]
async fn test_fallback_when_reconnect_delivers_nothing() {
    let started = Instant::now();
    let mut harness = Harness::start(
        vec![
            vec![chunk_100ms(), Step::dropped("going away")],
            vec![Step::dropped("going away")],
        ],
        options(),
    );

    let event = harness
        .wait_for(Duration::from_millis(1600), |e| {
            matches!(e, ReaderEvent::FallbackStarted { .. })
        })
        .await;

    assert!(event.is_some(), "fallback should start within one backoff");
    assert!(started.elapsed() <= Duration::from_millis(1600));
    assert!(harness.wait_for_state(SessionState::Degraded, Duration::from_millis(50)).await);
    assert_eq!(harness.transport.connects(), 2);
    assert_eq!(harness.fallback.calls(), vec![(TEXT.to_string(), 1.0)]);
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_reconnect_after_partial_stream() {
    let mut first = Vec::new();
    for _ in 0..5 {
        first.push(chunk_100ms());
        first.push(Step::wait_ms(20));
    }
    first.push(Step::dropped("connection reset"));

    let mut harness = Harness::start(vec![first, vec![chunk_100ms(), Step::Hang]], options());

    // Not before the backoff has elapsed
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(harness.transport.connects(), 1);
    assert_eq!(harness.session.state(), SessionState::Connecting);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(harness.transport.connects(), 2);
    assert!(harness.fallback.calls().is_empty());
    assert_eq!(harness.session.state(), SessionState::Streaming);

    let reconnects = harness
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, ReaderEvent::ReconnectScheduled { .. }))
        .count();
    assert_eq!(reconnects, 1);

    let stats = harness.session.stats();
    assert_eq!(stats.reconnects, 1);
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.chunks_received, 6);
    assert_eq!(stats.fallback_invocations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_keep_buffer_and_timeline() {
    let mut script: Vec<Step> = (0..10).map(|_| chunk_100ms()).collect();
    script.push(Step::Hang);
    let mut harness = Harness::start(vec![script], options());

    let session = &harness.session;
    assert!(helpers::wait_until(Duration::from_millis(200), || session.stats().chunks_received == 10).await);

    assert!(harness.session.pause());
    assert_eq!(harness.session.state(), SessionState::Paused);
    let next_time = harness.session.next_time();
    let device_time = harness.clock.current_time();

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(harness.session.next_time(), next_time);
    assert_eq!(harness.clock.current_time(), device_time);
    assert!(harness.session.resume());
    assert_eq!(harness.session.state(), SessionState::Streaming);
    assert_eq!(harness.session.buffer_stats().dropped, 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.clock.current_time() > device_time);
    assert_eq!(harness.transport.sent_of_type("pause").len(), 1);
    assert_eq!(harness.transport.sent_of_type("resume").len(), 1);

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ReaderEvent::SessionStateChanged { new_state: SessionState::Paused, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_pause_outside_streaming_is_noop() {
    let harness = Harness::start(vec![vec![Step::Hang]], options());

    assert_eq!(harness.session.state(), SessionState::Connecting);
    assert!(!harness.session.pause());
    assert!(!harness.session.resume());
    assert_eq!(harness.session.state(), SessionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_odd_length_chunk_leaves_buffer_untouched() {
    let harness = Harness::start(vec![vec![Step::Binary(vec![1, 2, 3]), Step::Hang]], options());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = harness.session.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.chunks_received, 0);
    assert_eq!(stats.buffer.written, 0);
    assert_eq!(harness.session.state(), SessionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_stream_continues_after_malformed_chunk() {
    let harness = Harness::start(
        vec![vec![Step::Binary(vec![0; 7]), chunk_100ms(), chunk_100ms(), Step::Hang]],
        options(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = harness.session.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.chunks_received, 2);
    assert_eq!(harness.session.state(), SessionState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_goes_to_fallback_without_reconnect() {
    let mut harness = Harness::start(Vec::new(), options());

    let event = harness
        .wait_for(Duration::from_millis(100), |e| {
            matches!(e, ReaderEvent::FallbackFinished { success: true, .. })
        })
        .await;
    assert!(event.is_some());
    assert_eq!(harness.session.state(), SessionState::Degraded);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(harness.transport.connects(), 1);
    assert_eq!(harness.fallback.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_audio_deadline_triggers_fallback() {
    let mut opts = options();
    opts.first_audio_timeout = Duration::from_secs(3);
    let harness = Harness::start(vec![vec![Step::Hang]], opts);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(harness.session.state(), SessionState::Connecting);
    assert!(harness.fallback.calls().is_empty());

    assert!(harness.wait_for_state(SessionState::Degraded, Duration::from_millis(300)).await);
    assert_eq!(harness.fallback.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_before_audio_is_a_failure() {
    let harness = Harness::start(vec![vec![Step::Close(Closure::Finished)]], options());

    assert!(harness.wait_for_state(SessionState::Degraded, Duration::from_millis(100)).await);
    assert_eq!(harness.transport.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_backoff_cancels_reconnect() {
    let mut harness = Harness::start(
        vec![
            vec![chunk_100ms(), Step::dropped("reset")],
            vec![chunk_100ms(), Step::Hang],
        ],
        options(),
    );

    let scheduled = harness
        .wait_for(Duration::from_millis(500), |e| {
            matches!(e, ReaderEvent::ReconnectScheduled { .. })
        })
        .await;
    assert!(scheduled.is_some());

    harness.session.stop();
    assert_eq!(harness.session.state(), SessionState::Closed);
    assert_eq!(harness.session.next_time(), harness.clock.current_time());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(harness.transport.connects(), 1);
    assert!(harness.fallback.calls().is_empty());
    assert_eq!(harness.session.state(), SessionState::Closed);
    assert!(harness.session.next_time() <= harness.clock.current_time());
    assert!(harness.session.is_finished());

    // Operations on a stopped session do nothing
    assert!(!harness.session.pause());
    assert!(harness.session.start().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_marks_and_announcements_are_forwarded() {
    let script = vec![
        Step::text(json!({"type": "hello", "sample_rate": DEVICE_RATE})),
        Step::text(json!({"type": "ready", "doc_id": "d7"})),
        Step::Binary(pcm16_sine(200, DEVICE_RATE, 330.0, 0.3)),
        Step::text(json!({
            "type": "mark", "sentence_id": "b1_s0", "status": "done",
            "seq": 0, "sample_rate": DEVICE_RATE, "num_samples": 3200
        })),
        Step::text(json!({"type": "stats", "ignored": true})),
        Step::Close(Closure::Finished),
    ];
    let mut harness = Harness::start(vec![script], options());

    let ready = harness
        .wait_for(Duration::from_millis(100), |e| matches!(e, ReaderEvent::SourceReady { .. }))
        .await;
    match ready {
        Some(ReaderEvent::SourceReady { sample_rate, .. }) => assert_eq!(sample_rate, Some(DEVICE_RATE)),
        other => panic!("expected SourceReady, got {:?}", other),
    }

    let mark = harness
        .wait_for(Duration::from_millis(100), |e| matches!(e, ReaderEvent::SentenceMark { .. }))
        .await;
    match mark {
        Some(ReaderEvent::SentenceMark { sentence_id, status, seq, .. }) => {
            assert_eq!(sentence_id, "b1_s0");
            assert_eq!(status.as_deref(), Some("done"));
            assert_eq!(seq, Some(0));
        }
        other => panic!("expected SentenceMark, got {:?}", other),
    }

    let finished = harness
        .wait_for(Duration::from_millis(100), |e| matches!(e, ReaderEvent::SourceFinished { .. }))
        .await;
    assert!(matches!(
        finished,
        Some(ReaderEvent::SourceFinished { chunks_received: 1, .. })
    ));

    let drained = harness
        .wait_for(Duration::from_secs(2), |e| matches!(e, ReaderEvent::PlaybackDrained { .. }))
        .await;
    assert!(drained.is_some());

    // End of stream is not a failure
    assert_eq!(harness.session.state(), SessionState::Streaming);
    assert_eq!(harness.transport.connects(), 1);
    assert!(harness.fallback.calls().is_empty());

    // The request went out first
    let sent = harness.transport.sent_json();
    assert_eq!(sent[0], json!({"text": TEXT}));
}

#[tokio::test(start_paused = true)]
async fn test_base64_audio_frames_are_played() {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode(pcm16_sine(100, SOURCE_RATE, 220.0, 0.3));
    let harness = Harness::start(
        vec![vec![
            Step::text(json!({"type": "audio", "pcm16_base64": encoded})),
            Step::Hang,
        ]],
        options(),
    );

    assert!(harness.wait_for_state(SessionState::Streaming, Duration::from_millis(100)).await);
    assert_eq!(harness.session.stats().chunks_received, 1);
}

#[tokio::test(start_paused = true)]
async fn test_tempo_sent_to_source_only_when_enabled() {
    let plain = Harness::start(vec![vec![chunk_100ms(), Step::Hang]], options());
    let mut opts = options();
    opts.send_tempo_to_source = true;
    let prosody = Harness::start(vec![vec![chunk_100ms(), Step::Hang]], opts);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(plain.session.set_tempo(10.0), 3.0);
    assert_eq!(prosody.session.set_tempo(-1.0), 0.5);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(plain.transport.sent_of_type("control").is_empty());
    assert_eq!(
        prosody.transport.sent_of_type("control"),
        vec![json!({"type": "control", "tempo": 0.5, "rate": 0.5})]
    );
    assert_eq!(plain.session.tempo(), 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_paused_listener_stays_paused_across_reconnect() {
    let mut harness = Harness::start(
        vec![
            vec![chunk_100ms(), Step::wait_ms(300), Step::dropped("reset")],
            vec![chunk_100ms(), Step::Hang],
        ],
        options(),
    );

    assert!(harness.wait_for_state(SessionState::Streaming, Duration::from_millis(100)).await);
    assert!(harness.session.pause());

    let scheduled = harness
        .wait_for(Duration::from_millis(500), |e| {
            matches!(e, ReaderEvent::ReconnectScheduled { .. })
        })
        .await;
    assert!(scheduled.is_some());
    assert_eq!(harness.session.state(), SessionState::Connecting);

    assert!(harness.wait_for_state(SessionState::Paused, Duration::from_secs(2)).await);
    assert_eq!(harness.transport.connects(), 2);
    assert!(harness.clock.is_suspended());
    // Once after the user paused, once more on the new connection
    assert_eq!(harness.transport.sent_of_type("pause").len(), 2);

    assert!(harness.session.resume());
    assert!(!harness.clock.is_suspended());
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_drain_restarts_timeline_at_device_time() {
    let mut harness = Harness::start(
        vec![vec![
            Step::Binary(pcm16_sine(200, DEVICE_RATE, 330.0, 0.3)),
            Step::Close(Closure::Finished),
        ]],
        options(),
    );

    let drained = harness
        .wait_for(Duration::from_secs(2), |e| matches!(e, ReaderEvent::PlaybackDrained { .. }))
        .await;
    assert!(drained.is_some());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.session.is_finished());
    assert!(harness.session.next_time() < harness.clock.current_time());

    harness.session.stop();
    assert_eq!(harness.session.state(), SessionState::Closed);
    assert_eq!(harness.session.next_time(), harness.clock.current_time());
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_fallback_restarts_timeline_at_device_time() {
    // The reconnect finds no script and fails
    let mut harness = Harness::start(vec![vec![chunk_100ms(), Step::dropped("reset")]], options());

    let finished = harness
        .wait_for(Duration::from_secs(2), |e| matches!(e, ReaderEvent::FallbackFinished { .. }))
        .await;
    assert!(matches!(finished, Some(ReaderEvent::FallbackFinished { success: true, .. })));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.session.state(), SessionState::Degraded);

    harness.session.stop();
    assert_eq!(harness.session.state(), SessionState::Closed);
    assert_eq!(harness.session.next_time(), harness.clock.current_time());
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_reconnecting_holds_output() {
    let mut harness = Harness::start(
        vec![
            vec![chunk_100ms(), Step::wait_ms(300), Step::dropped("reset")],
            vec![chunk_100ms(), Step::Hang],
        ],
        options(),
    );

    let scheduled = harness
        .wait_for(Duration::from_millis(500), |e| {
            matches!(e, ReaderEvent::ReconnectScheduled { .. })
        })
        .await;
    assert!(scheduled.is_some());
    assert_eq!(harness.session.state(), SessionState::Connecting);

    assert!(harness.session.pause());
    assert!(!harness.session.pause());
    assert_eq!(harness.session.state(), SessionState::Connecting);
    assert!(harness.clock.is_suspended());

    assert!(harness.wait_for_state(SessionState::Paused, Duration::from_secs(2)).await);
    assert_eq!(harness.transport.connects(), 2);
    assert!(harness.clock.is_suspended());
    // Only the new connection heard about it
    assert_eq!(harness.transport.sent_of_type("pause").len(), 1);
    assert_eq!(harness.session.stats().units_scheduled, 2);

    assert!(harness.session.resume());
    assert_eq!(harness.session.state(), SessionState::Streaming);
    assert!(!harness.clock.is_suspended());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.transport.sent_of_type("resume").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_while_reconnecting_lifts_pending_pause() {
    let mut harness = Harness::start(
        vec![
            vec![chunk_100ms(), Step::wait_ms(300), Step::dropped("reset")],
            vec![chunk_100ms(), Step::Hang],
        ],
        options(),
    );

    let scheduled = harness
        .wait_for(Duration::from_millis(500), |e| {
            matches!(e, ReaderEvent::ReconnectScheduled { .. })
        })
        .await;
    assert!(scheduled.is_some());

    assert!(harness.session.pause());
    assert!(harness.session.resume());
    assert!(!harness.session.resume());
    assert!(!harness.clock.is_suspended());

    assert!(harness.wait_for_state(SessionState::Streaming, Duration::from_secs(2)).await);
    assert_eq!(harness.transport.connects(), 2);
    assert!(harness.transport.sent_of_type("pause").is_empty());
}
