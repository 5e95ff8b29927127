//! Event types for streaming progress
//!
//! Events are sent from the engine to whoever passed an [`EventSink`] to
//! [`Pipeline::update`](crate::Pipeline::update). A streaming run reports
//! when it starts, at every pass boundary, and when it ends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Destination for the progress of streaming runs
///
/// The pass loop reports through this without knowing whether anyone is
/// listening. A failed delivery is logged and the run carries on.
pub trait EventSink: Send + Sync {
    fn send(&self, event: StreamEvent) -> Result<(), EventError>;
}

/// Why a progress event was not delivered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The receiving end of a channel sink was dropped
    #[error("progress receiver is gone")]
    Disconnected,

    /// A collecting sink's lock was poisoned by a panicking reader
    #[error("event collector is poisoned")]
    Poisoned,
}

/// Events emitted while a pipeline updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A streaming run planned its passes
    #[serde(rename_all = "camelCase")]
    RunStarted {
        node: String,
        run_id: String,
        passes: u64,
    },

    /// A pass is about to narrow its inputs
    #[serde(rename_all = "camelCase")]
    PassStarted {
        node: String,
        run_id: String,
        pass: u64,
        passes: u64,
    },

    /// A pass finished its compute hook
    #[serde(rename_all = "camelCase")]
    PassCompleted {
        node: String,
        run_id: String,
        pass: u64,
        passes: u64,
        progress: f32,
    },

    /// All passes finished and the run was finalized
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        node: String,
        run_id: String,
        passes: u64,
    },

    /// A compute hook asked for the pipeline to be reset
    #[serde(rename_all = "camelCase")]
    PipelineReset {
        node: String,
        run_id: String,
        pass: u64,
    },

    /// The run was aborted
    #[serde(rename_all = "camelCase")]
    RunFailed {
        node: String,
        run_id: String,
        pass: Option<u64>,
        error: String,
    },
}

impl StreamEvent {
    /// Create a pass completed event; progress is `(pass + 1) / passes`
    pub fn pass_completed(node: &str, run_id: &str, pass: u64, passes: u64) -> Self {
        Self::PassCompleted {
            node: node.to_string(),
            run_id: run_id.to_string(),
            pass,
            passes,
            progress: (pass + 1) as f32 / passes.max(1) as f32,
        }
    }

    /// Name of the node that emitted the event
    pub fn node(&self) -> &str {
        match self {
            Self::RunStarted { node, .. }
            | Self::PassStarted { node, .. }
            | Self::PassCompleted { node, .. }
            | Self::RunCompleted { node, .. }
            | Self::PipelineReset { node, .. }
            | Self::RunFailed { node, .. } => node,
        }
    }
}

/// Send an event, logging instead of failing when the sink refuses it
pub(crate) fn emit(sink: &dyn EventSink, event: StreamEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Dropping stream event: {}", e);
    }
}

/// Discards progress
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: StreamEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Keeps every event in memory, in emission order
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<StreamEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the events so far
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: StreamEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::Poisoned)?
            .push(event);
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel
///
/// Sending never blocks, so it is safe to use from the synchronous pass
/// loop while an async task drains the receiver.
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end of its channel
    pub fn channel() -> (Self, tokio::sync::mpsc::UnboundedReceiver<StreamEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: StreamEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::Disconnected)
    }
}
