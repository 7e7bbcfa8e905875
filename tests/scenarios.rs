/// End-to-end builder and execution flows
///
/// Drives the full pipeline the HTTP layer uses: a scripted proposal source
/// produces deltas, the mutation engine folds them into workflows, the
/// scheduler linearizes, and the interpreter executes against in-memory
/// providers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use apiloom::error::EngineResult;
use apiloom::graph::{self, GraphDelta, NodeType, Workflow};
use apiloom::llm::ProposalSource;
use apiloom::providers::memory::{MemoryDocumentStore, MemoryMailer};
use apiloom::providers::token::JwtSigner;
use apiloom::providers::DocumentStore;
use apiloom::runtime::{
    scheduler, ExecutionInterpreter, SchedulePolicy, ToolHandlerRegistry, TracingSink,
};
use apiloom::workflow::{WorkflowRegistry, WorkflowStorage};

/// Proposal source that replays a scripted queue of deltas.
struct ScriptedProposals {
    queue: Mutex<VecDeque<GraphDelta>>,
}

impl ScriptedProposals {
    fn new(deltas: Vec<Value>) -> Self {
        let queue = deltas
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        Self {
            queue: Mutex::new(queue),
        }
    }
}

#[async_trait]
impl ProposalSource for ScriptedProposals {
    async fn propose_delta(
        &self,
        _prompt: &str,
        _current: Option<&Workflow>,
    ) -> EngineResult<GraphDelta> {
        Ok(self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

fn signup_delta() -> Value {
    json!({
        "nodes": [
            {"id": "in", "type": "input", "fields": {}},
            {"id": "save", "type": "dbInsert", "fields": {
                "collection": "users",
                "document": {"email": "{{input.email}}"}
            }},
            {"id": "reply", "type": "response", "fields": {
                "status": 201,
                "body": {"created": "{{dbInsert.inserted._id}}"}
            }},
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "save"},
            {"id": "e2", "source": "save", "target": "reply"},
        ],
    })
}

fn interpreter_with(store: Arc<dyn DocumentStore>) -> ExecutionInterpreter {
    let registry = ToolHandlerRegistry::with_builtins(
        store,
        Arc::new(JwtSigner::new("test-secret")),
        Arc::new(MemoryMailer::new()),
    );
    ExecutionInterpreter::new(registry, Arc::new(TracingSink))
}

async fn execute(
    interpreter: &ExecutionInterpreter,
    workflow: &Workflow,
    input: Value,
) -> apiloom::ExecutionReport {
    let order = scheduler::order(
        workflow,
        SchedulePolicy {
            skip_input_nodes: true,
        },
    )
    .unwrap();
    interpreter.interpret(workflow, &order, input).await
}

#[tokio::test]
async fn generate_then_execute_signup_flow() {
    let proposals = ScriptedProposals::new(vec![signup_delta()]);
    let delta = proposals.propose_delta("signup API", None).await.unwrap();

    let base = Workflow::new("wf-1", "owner-1");
    let outcome = graph::merge(&base, &delta).unwrap();
    assert_eq!(outcome.nodes_added, 3);

    let store = Arc::new(MemoryDocumentStore::new());
    let interpreter = interpreter_with(store.clone());
    let report = execute(
        &interpreter,
        &outcome.workflow,
        json!({"email": "a@b.c"}),
    )
    .await;

    assert!(report.success());
    assert_eq!(report.output["status"], json!(201));
    assert_eq!(report.output["body"]["created"], json!(1));

    let saved = store
        .find("users", json!({"email": "a@b.c"}).as_object().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(saved.len(), 1);
}

#[tokio::test]
async fn mutation_inserts_validation_before_existing_steps() {
    let base = Workflow::new("wf-1", "owner-1");
    let first = graph::merge(&base, &serde_json::from_value(signup_delta()).unwrap())
        .unwrap()
        .workflow;

    let delta: GraphDelta = serde_json::from_value(json!({
        "nodes": [
            {"id": "validate", "type": "inputValidation", "fields": {
                "required": ["email"], "types": {"email": "string"}
            }},
        ],
        "edges": [
            {"id": "e3", "source": "in", "target": "validate"},
            {"id": "e4", "source": "validate", "target": "save"},
        ],
    }))
    .unwrap();
    let mutated = graph::merge(&first, &delta).unwrap().workflow;

    let order = scheduler::order(
        &mutated,
        SchedulePolicy {
            skip_input_nodes: true,
        },
    )
    .unwrap();
    let validate_pos = order.iter().position(|id| id == "validate").unwrap();
    let save_pos = order.iter().position(|id| id == "save").unwrap();
    assert!(validate_pos < save_pos);

    // Validation now rejects a payload without an email.
    let interpreter = interpreter_with(Arc::new(MemoryDocumentStore::new()));
    let report = execute(&interpreter, &mutated, json!({})).await;
    assert!(!report.success());
    assert_eq!(report.failing_step, Some(validate_pos));
}

#[tokio::test]
async fn successive_response_deltas_collapse_to_one() {
    let base = Workflow::new("wf-1", "owner-1");
    let mut workflow = graph::merge(&base, &serde_json::from_value(signup_delta()).unwrap())
        .unwrap()
        .workflow;

    for (id, body) in [("r2", "second"), ("r3", "third")] {
        let delta: GraphDelta = serde_json::from_value(json!({
            "nodes": [
                {"id": id, "type": "response", "fields": {
                    "status": 200, "body": {"message": body}
                }},
            ],
            "edges": [],
        }))
        .unwrap();
        workflow = graph::merge(&workflow, &delta).unwrap().workflow;
    }

    let responses: Vec<_> = workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Response)
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].fields["body"]["message"], json!("third"));
    // The surviving response stays last in insertion order.
    assert_eq!(
        workflow.nodes.last().unwrap().node_type,
        NodeType::Response
    );
}

#[tokio::test]
async fn re_merging_the_same_delta_is_idempotent() {
    let base = Workflow::new("wf-1", "owner-1");
    let delta: GraphDelta = serde_json::from_value(signup_delta()).unwrap();
    let once = graph::merge(&base, &delta).unwrap().workflow;
    let twice = graph::merge(&once, &delta).unwrap().workflow;

    assert_eq!(once.nodes.len(), twice.nodes.len());
    assert_eq!(once.edges.len(), twice.edges.len());
    let ids = |wf: &Workflow| {
        wf.nodes
            .iter()
            .map(|n| n.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&once), ids(&twice));
}

#[tokio::test]
async fn jwt_issue_then_authenticated_lookup() {
    // First workflow issues a token for the caller.
    let issue: GraphDelta = serde_json::from_value(json!({
        "nodes": [
            {"id": "in", "type": "input", "fields": {}},
            {"id": "token", "type": "jwtGenerate", "fields": {
                "payload": {"sub": "{{input.userId}}"}
            }},
            {"id": "reply", "type": "response", "fields": {
                "status": 200, "body": {"token": "{{jwtGenerate.token}}"}
            }},
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "token"},
            {"id": "e2", "source": "token", "target": "reply"},
        ],
    }))
    .unwrap();
    let issue_wf = graph::merge(&Workflow::new("wf-issue", "owner-1"), &issue)
        .unwrap()
        .workflow;

    let store = Arc::new(MemoryDocumentStore::new());
    let interpreter = interpreter_with(store.clone());
    let report = execute(&interpreter, &issue_wf, json!({"userId": "user-7"})).await;
    assert!(report.success());
    let token = report.output["body"]["token"].as_str().unwrap().to_string();

    // Second workflow gates a find behind the token.
    let guarded: GraphDelta = serde_json::from_value(json!({
        "nodes": [
            {"id": "in", "type": "input", "fields": {}},
            {"id": "auth", "type": "authMiddleware", "fields": {
                "token": "{{input.token}}"
            }},
            {"id": "lookup", "type": "dbFind", "fields": {
                "collection": "notes", "filter": {"owner": "{{auth.sub}}"}
            }},
            {"id": "reply", "type": "response", "fields": {
                "status": 200, "body": {"notes": "{{dbFind.documents}}"}
            }},
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "auth"},
            {"id": "e2", "source": "auth", "target": "lookup"},
            {"id": "e3", "source": "lookup", "target": "reply"},
        ],
    }))
    .unwrap();
    let guarded_wf = graph::merge(&Workflow::new("wf-guarded", "owner-1"), &guarded)
        .unwrap()
        .workflow;

    store
        .insert("notes", &json!({"owner": "user-7", "text": "hello"}))
        .await
        .unwrap();

    let report = execute(&interpreter, &guarded_wf, json!({"token": token})).await;
    assert!(report.success());
    assert_eq!(
        report.output["body"]["notes"][0]["text"],
        json!("hello")
    );

    // A bad token fails at the auth step, before the lookup.
    let report = execute(&interpreter, &guarded_wf, json!({"token": "garbage"})).await;
    assert!(!report.success());
    assert_eq!(report.failing_step, Some(0));
}

#[tokio::test]
async fn storage_round_trip_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(dir.path().join("workflows.db"))
        .create_if_missing(true);
    let pool = sqlx::sqlite::SqlitePool::connect_with(options).await.unwrap();

    let storage = WorkflowStorage::new(pool);
    storage.init_schema().await.unwrap();
    let registry = WorkflowRegistry::new(storage);

    let workflow = graph::merge(
        &Workflow::new("wf-1", "owner-1"),
        &serde_json::from_value(signup_delta()).unwrap(),
    )
    .unwrap()
    .workflow;

    registry.upsert(workflow.clone()).await.unwrap();
    let loaded = registry.get("wf-1").await.unwrap();
    assert_eq!(loaded.nodes.len(), workflow.nodes.len());
    assert_eq!(loaded.owner_id, "owner-1");

    let listed = registry.list("owner-1").await.unwrap();
    assert_eq!(listed.len(), 1);

    assert!(registry.remove("wf-1").await.unwrap());
    assert!(registry.get("wf-1").await.is_err());
}

#[tokio::test]
async fn rejected_delta_leaves_workflow_untouched() {
    let base = graph::merge(
        &Workflow::new("wf-1", "owner-1"),
        &serde_json::from_value(signup_delta()).unwrap(),
    )
    .unwrap()
    .workflow;

    // A delta that would close a cycle is rejected as a whole.
    let cycle: GraphDelta = serde_json::from_value(json!({
        "nodes": [],
        "edges": [{"id": "back", "source": "save", "target": "in"}],
    }))
    .unwrap();
    let err = graph::merge(&base, &cycle).unwrap_err();
    assert_eq!(err.kind(), "validation");

    // The pre-mutation graph still executes.
    let interpreter = interpreter_with(Arc::new(MemoryDocumentStore::new()));
    let report = execute(&interpreter, &base, json!({"email": "a@b.c"})).await;
    assert!(report.success());
}
