/// Structured execution log stream
///
/// The interpreter appends one entry per phase transition of every step. The
/// entries are returned to the caller with the execution result; a `LogSink`
/// additionally receives each entry as it is produced, fire-and-forget: a
/// slow or failed sink never blocks or fails the underlying step.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LogPhase {
    Start,
    Data,
    Success,
    Error,
    End,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub execution_id: String,
    pub step_index: usize,
    pub node_type: String,
    pub phase: LogPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp_ms: i64,
}

impl ExecutionLogEntry {
    pub fn new(
        execution_id: &str,
        step_index: usize,
        node_type: &str,
        phase: LogPhase,
        message: impl Into<String>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            step_index,
            node_type: node_type.to_string(),
            phase,
            message: message.into(),
            payload,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Best-effort observer of the execution log stream.
///
/// `append` must not block; implementations swallow their own failures.
pub trait LogSink: Send + Sync {
    fn append(&self, entry: &ExecutionLogEntry);
}

/// Default sink: forwards entries to `tracing` at debug level.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, entry: &ExecutionLogEntry) {
        tracing::debug!(
            execution_id = %entry.execution_id,
            step = entry.step_index,
            node_type = %entry.node_type,
            phase = ?entry.phase,
            "{}",
            entry.message
        );
    }
}

/// Sink that forwards entries over an unbounded channel, e.g. to a streaming
/// observer. Send errors (receiver gone) are ignored by design of the
/// fire-and-forget contract.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<ExecutionLogEntry>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<ExecutionLogEntry>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn append(&self, entry: &ExecutionLogEntry) {
        let _ = self.tx.send(entry.clone());
    }
}
