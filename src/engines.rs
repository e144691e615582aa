//! Engine list discovery and the process-wide engine snapshot.
//!
//! The registry starts with a single built-in engine so requests can be served
//! immediately. Discovery runs once in the background and, on success, swaps
//! in the full list. Readers always see either the old or the new list in
//! full, never a mix.

use crate::notifier::NotifierHandle;
use regex::Regex;
use std::process::Stdio;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} -S exited with {status}: {output}")]
    Exit {
        command: String,
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("no engines found in {command} -S output")]
    NoEngines { command: String },
}

pub struct EngineRegistry {
    engines: RwLock<Arc<[String]>>,
    preferred: String,
}

impl EngineRegistry {
    /// Registry whose initial list is just the preferred engine
    pub fn new(preferred: impl Into<String>) -> Self {
        let preferred = preferred.into();
        Self {
            engines: RwLock::new(Arc::from(vec![preferred.clone()])),
            preferred,
        }
    }

    pub fn preferred(&self) -> &str {
        &self.preferred
    }

    /// Current engine list, in invocation order
    pub fn snapshot(&self) -> Arc<[String]> {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new list. Empty lists are ignored so there is always at
    /// least one engine to try.
    pub fn replace(&self, engines: Vec<String>) {
        if engines.is_empty() {
            return;
        }
        *self.engines.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(engines);
    }

    /// Discover supported engines and install them, reporting the outcome
    /// through the notifier. Failures leave the current list untouched.
    pub async fn refresh(&self, command: &str, notifier: &NotifierHandle) {
        match discover(command, &self.preferred).await {
            Ok(engines) => {
                info!("Discovered {} engines: {}", engines.len(), engines.join(", "));
                notifier.info(format!("supported engines: {}", engines.join(", ")));
                self.replace(engines);
            }
            Err(e) => {
                warn!("Engine discovery failed, keeping {:?}: {}", self.snapshot(), e);
                notifier.error(format!("failed get engines list: {}", e));
            }
        }
    }
}

/// Run `<command> -S` and turn its output into an ordered engine list with
/// `preferred` first (when present)
pub async fn discover(command: &str, preferred: &str) -> Result<Vec<String>, DiscoveryError> {
    let output = Command::new(command)
        .arg("-S")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| DiscoveryError::Launch {
            command: command.to_string(),
            source,
        })?;

    // The listing is read from stdout and stderr together
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(DiscoveryError::Exit {
            command: command.to_string(),
            status: output.status,
            output: combined.trim().to_string(),
        });
    }

    let mut engines = parse_engine_list(&combined);
    if engines.is_empty() {
        return Err(DiscoveryError::NoEngines {
            command: command.to_string(),
        });
    }
    promote_preferred(&mut engines, preferred);

    Ok(engines)
}

fn word_token() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[0-9A-Za-z_]+").expect("static regex is valid"))
}

/// First word token of every line; lines without one are skipped
pub fn parse_engine_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| word_token().find(line))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Move the first occurrence of `preferred` to position 0, keeping the
/// relative order of every other engine. Later duplicates stay put.
///
/// This is a rotation, not a swap with index 0: when `preferred` sits at
/// index 2 or later a swap would move the old head past its neighbours,
/// while fallback relies on the discovered order of the others.
pub fn promote_preferred(engines: &mut [String], preferred: &str) {
    if let Some(index) = engines.iter().position(|engine| engine == preferred) {
        engines[..=index].rotate_right(1);
    }
}
