//! Single translation attempts against one named engine.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine {engine} exited with {status}")]
    Exit { engine: String, status: ExitStatus },

    #[error("empty reply from API")]
    EmptyReply,

    #[error("engine {engine} timed out after {timeout:?}")]
    Timeout { engine: String, timeout: Duration },
}

/// Backend capable of translating one word with one engine
#[async_trait]
pub trait EngineInvoker: Send + Sync {
    async fn invoke(&self, word: &str, language: &str, engine: &str)
        -> Result<String, InvokeError>;
}

/// Runs a translate-shell compatible command:
/// `<command> -e <engine> -b :<language> <word>`
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    command: String,
    timeout: Option<Duration>,
}

impl CommandInvoker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill and fail invocations that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EngineInvoker for CommandInvoker {
    async fn invoke(
        &self,
        word: &str,
        language: &str,
        engine: &str,
    ) -> Result<String, InvokeError> {
        let mut command = Command::new(&self.command);
        command
            .arg("-e")
            .arg(engine)
            .arg("-b")
            .arg(format!(":{}", language))
            .arg(word)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| InvokeError::Timeout {
                    engine: engine.to_string(),
                    timeout,
                })?,
            None => command.output().await,
        }
        .map_err(|source| InvokeError::Launch {
            command: self.command.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr for '{}': {}", engine, word, stderr.trim());
        }

        if !output.status.success() {
            warn!("Failed to translate '{}' with {}: {}", word, engine, output.status);
            return Err(InvokeError::Exit {
                engine: engine.to_string(),
                status: output.status,
            });
        }

        normalize_reply(&output.stdout).ok_or(InvokeError::EmptyReply)
    }
}

/// Trimmed, lowercased engine output; `None` when nothing is left
pub fn normalize_reply(stdout: &[u8]) -> Option<String> {
    let reply = String::from_utf8_lossy(stdout).trim().to_lowercase();
    if reply.is_empty() {
        None
    } else {
        Some(reply)
    }
}
