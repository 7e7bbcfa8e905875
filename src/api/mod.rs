/// HTTP API layer
///
/// REST endpoints for generating, mutating, managing and executing
/// workflows. Handlers translate `EngineError` variants into status codes
/// and a structured `{kind, message}` error body.

pub mod invoke;
pub mod workflows;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::llm::ProposalSource;
use crate::runtime::ExecutionInterpreter;
use crate::workflow::WorkflowRegistry;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkflowRegistry>,
    pub proposals: Arc<dyn ProposalSource>,
    pub interpreter: Arc<ExecutionInterpreter>,
}

pub(crate) type ApiError = (StatusCode, Json<Value>);

/// Map an engine error onto an HTTP status and structured body.
pub(crate) fn engine_error(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Validation(_)
        | EngineError::Proposal(_)
        | EngineError::Configuration(_)
        | EngineError::CycleDetected => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::UnknownNodeType(_)
        | EngineError::Handler { .. }
        | EngineError::Storage(_)
        | EngineError::Serde(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match &err {
        EngineError::Validation(violations) => json!({
            "kind": err.kind(),
            "message": err.to_string(),
            "violations": violations,
        }),
        _ => json!({ "kind": err.kind(), "message": err.to_string() }),
    };
    (status, Json(body))
}

pub(crate) fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "kind": "forbidden", "message": "workflow owned by another user" })),
    )
}
