/// Error taxonomy for the workflow engine
///
/// Every failure the core can produce maps onto one of these variants so the
/// API layer can turn it into a structured result instead of letting errors
/// cross the execution boundary as panics or opaque strings.

use thiserror::Error;

/// A single structural problem found while validating a graph.
///
/// Validation never stops at the first problem; callers get the full list so
/// a rejected mutation can report everything that was wrong with the delta.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    /// Two nodes share the same id
    DuplicateNodeId { node_id: String },
    /// An edge references a node id that does not exist in the graph
    DanglingEdge { edge_id: String, node_id: String },
    /// More than one response-typed node survived a merge
    MultipleResponseNodes { count: usize },
    /// A response node has an outgoing edge, so it cannot be terminal
    ResponseNotTerminal { node_id: String },
    /// The edges form a cycle; the graph has no valid linearization
    CycleDetected,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::DuplicateNodeId { node_id } => {
                write!(f, "duplicate node id '{node_id}'")
            }
            Violation::DanglingEdge { edge_id, node_id } => {
                write!(f, "edge '{edge_id}' references unknown node '{node_id}'")
            }
            Violation::MultipleResponseNodes { count } => {
                write!(f, "{count} response nodes present, at most one allowed")
            }
            Violation::ResponseNotTerminal { node_id } => {
                write!(f, "response node '{node_id}' has outgoing edges")
            }
            Violation::CycleDetected => write!(f, "workflow contains a cycle"),
        }
    }
}

/// Engine-level error taxonomy
///
/// - `Validation` / `Proposal` reject a mutation outright; the pre-mutation
///   graph is preserved.
/// - `Configuration` / `UnknownNodeType` are fatal to a single execution and
///   raised before the offending handler runs where feasible.
/// - `Handler` fails the current execution at the current step; the
///   interpreter never retries.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("graph validation failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    #[error("workflow contains a cycle")]
    CycleDetected,

    #[error("malformed proposal: {0}")]
    Proposal(String),

    #[error("node misconfigured: {0}")]
    Configuration(String),

    #[error("no handler registered for node type '{0}'")]
    UnknownNodeType(String),

    #[error("step {step} failed: {message}")]
    Handler { step: usize, message: String },

    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Short machine-readable tag used in API responses and log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::CycleDetected => "cycle",
            EngineError::Proposal(_) => "proposal",
            EngineError::Configuration(_) => "configuration",
            EngineError::UnknownNodeType(_) => "unknownNodeType",
            EngineError::Handler { .. } => "handler",
            EngineError::NotFound(_) => "notFound",
            EngineError::Storage(_) => "storage",
            EngineError::Serde(_) => "serde",
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type EngineResult<T> = Result<T, EngineError>;
