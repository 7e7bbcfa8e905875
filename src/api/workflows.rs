/// Workflow builder REST endpoints
///
/// Covers the chat-driven build loop (generate a new workflow from a prompt,
/// mutate an existing one) plus plain CRUD. Every mutation goes through the
/// merge engine: deltas are validated as a whole and rejected without
/// touching the stored graph.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{engine_error, forbidden, ApiError, AppState};
use crate::graph::{self, GraphDelta, Workflow};

/// Request body for prompt-driven generation and mutation.
///
/// `delta` short-circuits the model call: an explicit delta is merged as-is,
/// which is how UI-side edits arrive.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub owner_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub delta: Option<GraphDelta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub owner_id: String,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/generate", post(generate_workflow))
        .route("/api/workflows/{id}/mutate", post(mutate_workflow))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}", delete(delete_workflow))
}

/// Create a new workflow from a prompt or an explicit delta
///
/// POST /api/workflows/generate
/// Body: { "ownerId": "...", "name": "...", "prompt": "..." }
async fn generate_workflow(
    State(state): State<AppState>,
    Json(payload): Json<BuildRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if payload.owner_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "kind": "badRequest", "message": "ownerId is required" })),
        ));
    }

    let delta = resolve_delta(&state, &payload, None).await?;

    let mut workflow = Workflow::new(
        uuid::Uuid::new_v4().to_string(),
        payload.owner_id.clone(),
    );
    workflow.name = payload.name.unwrap_or_default();

    let outcome = graph::merge(&workflow, &delta).map_err(engine_error)?;
    let stored = state
        .registry
        .upsert(outcome.workflow)
        .await
        .map_err(engine_error)?;

    tracing::info!(
        "🔥 Generated workflow '{}' ({} nodes added)",
        stored.workflow_id,
        outcome.nodes_added
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "workflow": &*stored, "nodesAdded": outcome.nodes_added })),
    ))
}

/// Apply a prompt or delta to an existing workflow
///
/// POST /api/workflows/:id/mutate
/// Concurrent mutations against the same workflow are serialized; a rejected
/// delta leaves the stored graph untouched.
async fn mutate_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<BuildRequest>,
) -> Result<Json<Value>, ApiError> {
    let lock = state.registry.mutation_lock(&id).await;
    let _guard = lock.lock().await;

    let existing = state.registry.get(&id).await.map_err(engine_error)?;
    if existing.owner_id != payload.owner_id {
        return Err(forbidden());
    }

    let delta = resolve_delta(&state, &payload, Some(&existing)).await?;
    let outcome = graph::merge(&existing, &delta).map_err(engine_error)?;
    let stored = state
        .registry
        .upsert(outcome.workflow)
        .await
        .map_err(engine_error)?;

    tracing::info!(
        "🔧 Mutated workflow '{}' ({} nodes added)",
        id,
        outcome.nodes_added
    );
    Ok(Json(
        json!({ "workflow": &*stored, "nodesAdded": outcome.nodes_added }),
    ))
}

/// List workflows owned by a user
///
/// GET /api/workflows?ownerId=...
async fn list_workflows(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Value>, ApiError> {
    let workflows = state
        .registry
        .list(&query.owner_id)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({ "workflows": workflows })))
}

/// GET /api/workflows/:id?ownerId=...
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.registry.get(&id).await.map_err(engine_error)?;
    if workflow.owner_id != query.owner_id {
        return Err(forbidden());
    }
    Ok(Json((*workflow).clone()))
}

/// DELETE /api/workflows/:id?ownerId=...
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state.registry.get(&id).await.map_err(engine_error)?;
    if workflow.owner_id != query.owner_id {
        return Err(forbidden());
    }
    state.registry.remove(&id).await.map_err(engine_error)?;
    tracing::info!("🗑️ Deleted workflow '{}'", id);
    Ok(Json(json!({ "message": "workflow deleted" })))
}

/// Resolve a delta from the request: explicit delta wins, otherwise the
/// prompt goes to the proposal source.
async fn resolve_delta(
    state: &AppState,
    payload: &BuildRequest,
    current: Option<&Workflow>,
) -> Result<GraphDelta, ApiError> {
    if let Some(delta) = &payload.delta {
        return Ok(delta.clone());
    }
    let Some(prompt) = payload.prompt.as_deref().filter(|p| !p.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "kind": "badRequest",
                "message": "either prompt or delta is required",
            })),
        ));
    };
    state
        .proposals
        .propose_delta(prompt, current)
        .await
        .map_err(engine_error)
}
