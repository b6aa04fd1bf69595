//! Status channel between the harvester and whatever front end is watching it.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::info;

use super::stats::RunStats;
use crate::core::types::{RunState, StopReason};

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Free-form progress line ("Found 12 new contacts. Total: 140").
    Message(String),
    /// Per-iteration stats refresh.
    Stats(RunStats),
    /// The run reached a terminal state.
    Finished { state: RunState, total: usize },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Message(msg) => f.write_str(msg),
            StatusEvent::Stats(stats) => write!(f, "{}", stats),
            StatusEvent::Finished { state, total } => match state {
                RunState::Stopped(reason) if reason.is_clean() => {
                    write!(f, "✅ Finished ({}). {} contacts collected", reason, total)
                }
                RunState::Stopped(StopReason::Error(msg)) => {
                    write!(f, "❌ Error: {}. {} contacts kept", msg, total)
                }
                other => write!(f, "❌ Finished ({}). {} contacts kept", other, total),
            },
        }
    }
}

/// Receiver of status updates. Publishing must never block the loop.
pub trait StatusSink: Send + Sync {
    fn publish(&self, event: StatusEvent);
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&self, event: StatusEvent) {
        info!("Status: {}", event);
    }
}

/// Fans events out to any number of subscribers (the console UI). Lagging or absent
/// subscribers lose events; the harvester never waits for them.
#[derive(Debug, Clone)]
pub struct BroadcastStatusSink {
    tx: broadcast::Sender<StatusEvent>,
}

impl BroadcastStatusSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }
}

impl StatusSink for BroadcastStatusSink {
    fn publish(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

/// Several sinks behind one.
#[derive(Clone, Default)]
pub struct FanoutStatusSink {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl FanoutStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutStatusSink {
    fn publish(&self, event: StatusEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.publish(event.clone());
            }
            last.publish(event);
        }
    }
}

/// Keeps every event in memory; handy for embedding and tests.
#[derive(Default)]
pub struct MemoryStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Rendered text of every event except stats refreshes.
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, StatusEvent::Stats(_)))
            .map(|e| e.to_string())
            .collect()
    }
}

impl StatusSink for MemoryStatusSink {
    fn publish(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}
