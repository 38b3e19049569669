//! Scripted transport and recording fallback
//!
//! Each `connect()` takes the next script. A background task plays the
//! script into the connection's inbound channel, so `recv()` stays
//! cancel-safe and waits follow tokio time. When the scripts run out,
//! `connect()` fails.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use ttsr_player::session::{Closure, Connection, FallbackSynth, Inbound, Transport, TransportError};

/// One scripted inbound event
#[derive(Debug, Clone)]
pub enum Step {
    Binary(Vec<u8>),
    Text(String),
    /// Pause the script
    Wait(Duration),
    /// Close the connection
    Close(Closure),
    /// Keep the connection open without sending anything
    Hang,
}

impl Step {
    pub fn text(json: serde_json::Value) -> Self {
        Step::Text(json.to_string())
    }

    pub fn dropped(reason: &str) -> Self {
        Step::Close(Closure::Dropped(reason.to_string()))
    }

    pub fn wait_ms(ms: u64) -> Self {
        Step::Wait(Duration::from_millis(ms))
    }
}

pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    connects: AtomicUsize,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of connect attempts so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every text frame the session sent, across all connections
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames parsed as JSON
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect()
    }

    /// Sent control messages of the given `type`
    pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let Some(script) = script else {
            return Err(TransportError::Connect("connection refused".to_string()));
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(play(script, tx));

        Ok(Box::new(ScriptedConnection {
            rx,
            sent: Arc::clone(&self.sent),
        }))
    }
}

async fn play(script: Vec<Step>, tx: mpsc::UnboundedSender<Inbound>) {
    for step in script {
        match step {
            Step::Binary(data) => {
                let _ = tx.send(Inbound::Binary(data));
            }
            Step::Text(text) => {
                let _ = tx.send(Inbound::Text(text));
            }
            Step::Wait(duration) => tokio::time::sleep(duration).await,
            Step::Close(closure) => {
                let _ = tx.send(Inbound::Closed(closure));
                return;
            }
            Step::Hang => std::future::pending::<()>().await,
        }
    }
}

struct ScriptedConnection {
    rx: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Inbound {
        match self.rx.recv().await {
            Some(inbound) => inbound,
            None => Inbound::Closed(Closure::Dropped("script ended".to_string())),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Fallback that records calls and finishes immediately
#[derive(Default)]
pub struct RecordingFallback {
    calls: Mutex<Vec<(String, f32)>>,
    pub spoken: Notify,
}

impl RecordingFallback {
    pub fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackSynth for RecordingFallback {
    async fn speak(&self, text: &str, rate: f32) -> ttsr_player::Result<()> {
        self.calls.lock().unwrap().push((text.to_string(), rate));
        self.spoken.notify_waiters();
        Ok(())
    }
}
