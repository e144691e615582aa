//! Operational notifications with time-windowed batching.
//!
//! Any component can hold a [`NotifierHandle`] and push event strings into it.
//! A single [`Notifier`] task owns the pending batch: events are appended as
//! they arrive and, on every tick, the batch is joined with newlines and
//! handed to the [`NotificationSink`] in one call.
//!
//! Delivery rules:
//! - producers never block, the channel is unbounded
//! - a failed send keeps the batch, so the next tick retries it together with
//!   anything that arrived meanwhile
//! - without a sink the batch is dropped on every tick

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// First event pushed after startup
pub const STARTUP_MESSAGE: &str = "import-lang backend started";

/// Something that can deliver a block of text somewhere a human will read it
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Cheap, cloneable producer side of the notification channel
#[derive(Debug, Clone)]
pub struct NotifierHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl NotifierHandle {
    /// Queue a raw event. Never blocks; events sent after the notifier has
    /// shut down are dropped.
    pub fn notify(&self, message: impl Into<String>) {
        if self.tx.send(message.into()).is_err() {
            debug!("Notifier is gone, dropping event");
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.notify(format!("[info] {}", message.as_ref()));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.notify(format!("[error] {}", message.as_ref()));
    }
}

pub struct Notifier {
    rx: mpsc::UnboundedReceiver<String>,
    sink: Option<Arc<dyn NotificationSink>>,
    interval: Duration,
    batch: Vec<String>,
}

impl Notifier {
    /// Create the consumer and its first producer handle. Events can be
    /// queued right away; they are held until the notifier runs.
    pub fn new(interval: Duration) -> (Self, NotifierHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            rx,
            sink: None,
            interval,
            batch: Vec::new(),
        };
        (notifier, NotifierHandle { tx })
    }

    /// `None` when the transport could not be set up at startup
    pub fn with_sink(mut self, sink: Option<Arc<dyn NotificationSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until every handle has been dropped, then make one last delivery
    /// attempt for whatever is still pending.
    pub async fn run(mut self) {
        match self.sink {
            Some(_) => info!("Notifier started (interval {:?})", self.interval),
            None => warn!("Notifier started without a sink, notifications will be discarded"),
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(message) => self.push(message),
                    None => {
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.flush().await,
            }
        }

        info!("Notifier stopped");
    }

    fn push(&mut self, message: String) {
        info!("{}", message);
        self.batch.push(message);
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let Some(sink) = &self.sink else {
            // No transport: drop rather than grow forever
            self.batch.clear();
            return;
        };

        let text = self.batch.join("\n");
        info!("Sending notification batch ({} events)", self.batch.len());
        match sink.send(&text).await {
            Ok(()) => {
                self.batch.clear();
                info!("Notification batch sent");
            }
            Err(e) => {
                warn!("Failed to send notification batch, will retry: {:#}", e);
            }
        }
    }
}
