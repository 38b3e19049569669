//! Local fallback speech synthesis
//!
//! Used when a stream attempt fails before delivering any audio. The default
//! implementation runs a speech program (espeak-ng unless configured
//! otherwise) and feeds it the text on stdin.

use crate::config::FallbackConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Local speech synthesis backend
#[async_trait]
pub trait FallbackSynth: Send + Sync {
    /// Speak `text` at tempo `rate` (1.0 = normal); resolves when done
    ///
    /// Dropping the future must stop the speech.
    async fn speak(&self, text: &str, rate: f32) -> Result<()>;
}

/// Fallback that shells out to a speech program
#[derive(Debug, Clone)]
pub struct CommandFallback {
    config: FallbackConfig,
}

impl CommandFallback {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Arguments with `{rate}` and `{wpm}` substituted
    pub fn expand_args(&self, rate: f32) -> Vec<String> {
        let wpm = (self.config.base_wpm as f32 * rate).round() as u32;
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{rate}", &format!("{:.2}", rate))
                    .replace("{wpm}", &wpm.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl FallbackSynth for CommandFallback {
    async fn speak(&self, text: &str, rate: f32) -> Result<()> {
        if !self.config.enabled {
            warn!("Fallback synthesis disabled; {} chars not spoken", text.len());
            return Ok(());
        }

        let args = self.expand_args(rate);
        info!("Fallback synthesis: {} {:?}", self.config.program, args);

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Fallback(format!("failed to start {}: {}", self.config.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        debug!("Fallback program exited: {}", status);
        if status.success() {
            Ok(())
        } else {
            Err(Error::Fallback(format!("{} exited with {}", self.config.program, status)))
        }
    }
}
