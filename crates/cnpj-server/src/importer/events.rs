//! Progress and log event emission
//!
//! Events are fire-and-forget: the run emits them whether or not a browser
//! is connected, and nothing is buffered for late subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

/// Snapshot of the run counters, pushed after every visited item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Identifiers visited so far this run (skipped or fetched)
    pub consulted: u64,
    /// Size of the candidate list
    pub total: u64,
    /// Identifiers fetched from the registry API this run
    pub session_consulted: u64,
    /// Candidate list size (mirrors `total` for the UI gauge)
    pub total_sitac: u64,
    /// Estimated destination row count
    pub total_final: u64,
}

/// A single event pushed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    Progress(ProgressSnapshot),
    Log { message: String },
    Status { message: String },
    Error { message: String },
}

impl ImportEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ImportEvent::Progress(_) => "progress",
            ImportEvent::Log { .. } => "log",
            ImportEvent::Status { .. } => "status",
            ImportEvent::Error { .. } => "error",
        }
    }

    /// JSON payload for the SSE data field.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            ImportEvent::Progress(snapshot) => {
                serde_json::to_value(snapshot).unwrap_or_default()
            },
            ImportEvent::Log { message }
            | ImportEvent::Status { message }
            | ImportEvent::Error { message } => serde_json::json!({ "message": message }),
        }
    }
}

/// One-directional sink for run events.
///
/// Emission must never block or fail the run; a sink with no consumer
/// simply drops events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ImportEvent);
}

/// Broadcast-backed event bus; SSE handlers subscribe to it.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Create a bus with the given subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: ImportEvent) {
        // Err just means no subscriber is currently connected
        let _ = self.tx.send(event);
    }
}

/// Sink that discards everything. Used in tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ImportEvent) {}
}
