/// Workflow execution endpoint
///
/// POST /api/workflows/:id/execute runs a stored workflow against a caller
/// payload and returns the execution report: final output, phase log, and
/// the failing step when the run did not complete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{engine_error, forbidden, ApiError, AppState};
use crate::runtime::{scheduler, SchedulePolicy};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub owner_id: String,
    #[serde(default)]
    pub input: Value,
}

pub fn create_invoke_routes() -> Router<AppState> {
    Router::new().route("/api/workflows/{id}/execute", post(execute_workflow))
}

/// Execute a workflow once
///
/// A failed run is not a transport error: it comes back as 422 with the
/// partial log and failing step so the builder UI can show what happened.
async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let workflow = state.registry.get(&id).await.map_err(engine_error)?;
    if workflow.owner_id != payload.owner_id {
        return Err(forbidden());
    }

    let order = scheduler::order(
        &workflow,
        SchedulePolicy {
            skip_input_nodes: true,
        },
    )
    .map_err(engine_error)?;

    let report = state
        .interpreter
        .interpret(&workflow, &order, payload.input)
        .await;

    let status = if report.success() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let mut body = json!({
        "success": report.success(),
        "executionId": report.execution_id,
        "output": report.output,
        "log": report.log,
    });
    if let Some(step) = report.failing_step {
        body["failingStep"] = json!(step);
    }
    if let Some(error) = &report.error {
        body["error"] = json!(error);
    }
    Ok((status, Json(body)))
}
