//! Lifecycle events and their per-tick payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::pipe::Pipe;

/// A lifecycle event delivered to listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The type of event
    pub kind: EventKind,
    /// Output drained during the tick, `None` when no stream produced anything
    pub payload: Option<TickPayload>,
}

impl ProcessEvent {
    /// Create an event, folding an empty payload into `None`
    pub fn new(kind: EventKind, payload: Option<TickPayload>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            payload: payload.filter(|p| !p.is_empty()),
        }
    }

    /// Output drained from `pipe` during the tick
    pub fn output(&self, pipe: Pipe) -> Option<&StreamOutput> {
        self.payload.as_ref().and_then(|p| p.get(pipe))
    }
}

/// Types of lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Fired once before the first poll
    Start,
    /// Fired once per tick while the process is alive
    Running,
    /// Fired exactly once when the process has exited
    Finished,
}

impl EventKind {
    /// The event name listeners are registered under
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Running => "running",
            EventKind::Finished => "finished",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output one stream produced during a single tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOutput {
    /// Trimmed chunks in arrival order
    pub buffer: Vec<String>,
    /// The most recent chunk
    pub message: String,
}

impl StreamOutput {
    /// Wrap a non-empty chunk group
    pub fn from_group(buffer: Vec<String>) -> Self {
        let message = buffer.last().cloned().unwrap_or_default();
        Self { buffer, message }
    }
}

/// Per-stream output of one tick, keyed by stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickPayload {
    streams: BTreeMap<Pipe, StreamOutput>,
}

impl TickPayload {
    /// Record the output of one stream
    pub fn insert(&mut self, pipe: Pipe, output: StreamOutput) {
        self.streams.insert(pipe, output);
    }

    /// Output of one stream, absent if it produced nothing this tick
    pub fn get(&self, pipe: Pipe) -> Option<&StreamOutput> {
        self.streams.get(&pipe)
    }

    /// True when no stream produced output
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Iterate over streams that produced output
    pub fn iter(&self) -> impl Iterator<Item = (Pipe, &StreamOutput)> {
        self.streams.iter().map(|(pipe, out)| (*pipe, out))
    }
}
