//! TTS Reader streaming player (ttsr-player) - Main entry point
//!
//! Connects to a synthesis source, plays the stream through the default (or
//! named) output device and takes simple commands on stdin:
//!
//! - `p` pause, `r` resume
//! - `t <x>` set tempo
//! - `s` / `q` stop and exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttsr_common::{EventBus, ReaderEvent};
use ttsr_player::audio::CpalOutput;
use ttsr_player::config::PlayerConfig;
use ttsr_player::playback::build_playout;
use ttsr_player::session::{CommandFallback, SessionOptions, StreamRequest, WebSocketTransport};
use ttsr_player::Session;

/// How often the output stream's error flag is checked
const OUTPUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Command-line arguments for ttsr-player
#[derive(Parser, Debug)]
#[command(name = "ttsr-player")]
#[command(about = "Streaming text-to-speech player")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TTSR_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the synthesis source
    #[arg(short, long, env = "TTSR_STREAM_URL")]
    url: Option<String>,

    /// Text to read
    #[arg(short, long, required_unless_present_any = ["doc_id", "list_devices"])]
    text: Option<String>,

    /// Prepared document to read instead of literal text
    #[arg(long)]
    doc_id: Option<String>,

    /// Initial tempo (0.5 - 3.0)
    #[arg(long)]
    tempo: Option<f32>,

    /// Output device name
    #[arg(short, long, env = "TTSR_DEVICE")]
    device: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PlayerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let default_filter = format!(
        "ttsr_player={level},ttsr_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting ttsr-player {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    if args.list_devices {
        for name in CpalOutput::list_devices().context("Failed to list devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut output = CpalOutput::open(config.playback.device.as_deref())
        .context("Failed to open audio output")?;
    info!(
        "Output device: {} ({}Hz, {} channels)",
        output.device_name(),
        output.sample_rate(),
        output.channels()
    );

    let playout = build_playout(output.sample_rate(), &config.playback, &config.tempo);
    output
        .start(playout.renderer)
        .context("Failed to start audio output")?;

    let mut request = match (&args.doc_id, &args.text) {
        (Some(doc_id), _) => StreamRequest::for_document(doc_id.clone()),
        (None, Some(text)) => StreamRequest::for_text(text.clone()),
        (None, None) => StreamRequest::default(),
    };
    if args.doc_id.is_some() {
        request.text = args.text.clone();
    }
    request.rate = Some(playout.tempo.get());

    let events = EventBus::default();
    let mut event_rx = events.subscribe();
    let mut session = Session::new(
        SessionOptions::from_config(&config.stream, request),
        playout.scheduler,
        playout.tempo,
        Arc::new(WebSocketTransport::new(config.stream.url.clone())),
        Arc::new(CommandFallback::new(config.fallback.clone())),
        events,
    );
    session.start().context("Failed to start session")?;
    info!("Streaming from {}", config.stream.url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut stdin_open = true;
    let mut health = tokio::time::interval(OUTPUT_CHECK_INTERVAL);
    let mut output_errors = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_command(&session, line.trim()) {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
            event = event_rx.recv() => match event {
                Ok(event) => {
                    if !report_event(&event) {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} events", missed);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = health.tick() => {
                if output.has_error() && output.error_count() > output_errors {
                    output_errors = output.error_count();
                    warn!("Audio output reported {} stream errors", output_errors);
                }
            }
        }
    }

    let stats = session.stats();
    info!(
        "Session ended: {} chunks in {} units, {} decode errors, {} attempts, {} samples dropped, {} underruns",
        stats.chunks_received,
        stats.units_scheduled,
        stats.decode_errors,
        stats.attempts,
        stats.buffer.dropped,
        stats.buffer.underruns
    );

    session.stop();
    session.join().await;
    output.stop().context("Failed to stop audio output")?;

    info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut PlayerConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.stream.url = url.clone();
    }
    if let Some(tempo) = args.tempo {
        config.playback.tempo = tempo;
    }
    if let Some(device) = &args.device {
        config.playback.device = Some(device.clone());
    }
}

/// Returns false when the listener asked to quit
fn handle_command(session: &Session, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("p") => {
            if !session.pause() {
                println!("(cannot pause while {})", session.state());
            }
        }
        Some("r") => {
            if !session.resume() {
                println!("(cannot resume while {})", session.state());
            }
        }
        Some("t") => match parts.next().map(str::parse::<f32>) {
            Some(Ok(tempo)) => println!("tempo {:.2}", session.set_tempo(tempo)),
            _ => println!("usage: t <tempo>"),
        },
        Some("s") | Some("q") => return false,
        Some(other) => println!("unknown command '{}' (p, r, t <x>, s, q)", other),
        None => {}
    }
    true
}

/// Print an event; returns false once nothing more will be heard
fn report_event(event: &ReaderEvent) -> bool {
    match event {
        ReaderEvent::SentenceMark {
            sentence_id, status, ..
        } => {
            println!("[mark] {} {}", sentence_id, status.as_deref().unwrap_or(""));
        }
        ReaderEvent::SessionStateChanged { new_state, .. } => {
            println!("[state] {}", new_state);
        }
        ReaderEvent::ReconnectScheduled { delay_ms, .. } => {
            println!("[reconnect] in {} ms", delay_ms);
        }
        ReaderEvent::FallbackFinished { .. } | ReaderEvent::PlaybackDrained { .. } => {
            println!("[done]");
            return false;
        }
        _ => {}
    }
    true
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
