//! Progress events emitted while a run executes.
//!
//! Events are fire-and-forget notifications: the engine never blocks on a
//! consumer acknowledging them, and a vanished consumer never fails a run.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::{ExecutionId, ExecutionStatus, ExecutionStep};

/// A notification about a running execution
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A step changed status; carries the full step snapshot
    StepUpdated { step: ExecutionStep },
    /// The run reached a terminal status. Emitted exactly once per run,
    /// after every step event for that run.
    Completed {
        id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    },
}

/// Sink for run events
pub trait RunEvents: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Forwards events over an unbounded channel. Dropped receivers drop events.
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RunEvents for ChannelEvents {
    fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event
pub struct NullEvents;

impl RunEvents for NullEvents {
    fn emit(&self, _event: RunEvent) {}
}
