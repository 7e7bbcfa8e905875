/// Step-by-step workflow interpreter
///
/// Walks a scheduled node order, dispatching each step to its registered
/// handler. Failures never escape as errors: every run produces an
/// `ExecutionReport` carrying the terminal state, the final output and the
/// full phase log up to the point the run stopped.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::graph::{Node, NodeType, Workflow};
use crate::runtime::context::ExecutionContext;
use crate::runtime::handlers::ToolHandlerRegistry;
use crate::runtime::log::{ExecutionLogEntry, LogPhase, LogSink};
use crate::runtime::template;

/// Lifecycle of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Everything the caller learns about one execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub execution_id: String,
    pub state: RunState,
    /// Response node output when present, otherwise the last step's output.
    pub output: Value,
    pub log: Vec<ExecutionLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.state == RunState::Succeeded
    }
}

pub struct ExecutionInterpreter {
    registry: ToolHandlerRegistry,
    sink: Arc<dyn LogSink>,
}

impl ExecutionInterpreter {
    pub fn new(registry: ToolHandlerRegistry, sink: Arc<dyn LogSink>) -> Self {
        Self { registry, sink }
    }

    /// Run `workflow` along the scheduled `order` with `input` seeding the
    /// variable scope. `order` is expected to come from the scheduler with
    /// input nodes already filtered out.
    pub async fn interpret(
        &self,
        workflow: &Workflow,
        order: &[String],
        input: Value,
    ) -> ExecutionReport {
        let mut ctx = ExecutionContext::new(&workflow.workflow_id, &workflow.owner_id, input);
        let mut log: Vec<ExecutionLogEntry> = Vec::new();
        let mut last_output = Value::Null;
        let mut state = RunState::Running;

        tracing::info!(
            "🚀 Executing workflow '{}' ({} steps)",
            workflow.workflow_id,
            order.len()
        );

        for (step_index, node_id) in order.iter().enumerate() {
            ctx.step_index = step_index;
            let Some(node) = workflow.nodes.iter().find(|n| &n.id == node_id) else {
                return self.fail(
                    ctx,
                    log,
                    step_index,
                    "scheduler",
                    format!("scheduled node '{node_id}' not present in workflow"),
                );
            };
            let tag = node.node_type.tag();

            let Some(handler) = self.registry.get(node.node_type) else {
                return self.fail(
                    ctx,
                    log,
                    step_index,
                    tag,
                    format!("no handler registered for node type '{tag}'"),
                );
            };

            self.push(
                &mut log,
                &ctx,
                tag,
                LogPhase::Start,
                format!("step {step_index}: {tag} '{}'", node.id),
                None,
            );

            let resolved = Node {
                fields: template::resolve_fields(&node.fields, &ctx.vars),
                ..node.clone()
            };
            if node.node_type.requires_complete_fields() {
                if let Some(field) = first_null_field(&resolved) {
                    return self.fail(
                        ctx,
                        log,
                        step_index,
                        tag,
                        format!(
                            "node '{}' field '{field}' resolved to null",
                            node.id
                        ),
                    );
                }
            }

            let started = Instant::now();
            match handler.run(&resolved, &mut ctx).await {
                Ok(output) => {
                    let elapsed = started.elapsed().as_millis();
                    self.push(
                        &mut log,
                        &ctx,
                        tag,
                        LogPhase::Data,
                        format!("{tag} output"),
                        Some(output.clone()),
                    );
                    self.push(
                        &mut log,
                        &ctx,
                        tag,
                        LogPhase::Success,
                        format!("{tag} completed in {elapsed}ms"),
                        None,
                    );
                    ctx.publish(tag, &node.id, output.clone());
                    last_output = output;

                    if node.node_type == NodeType::Response {
                        state = RunState::Succeeded;
                        self.push(
                            &mut log,
                            &ctx,
                            tag,
                            LogPhase::End,
                            "execution finished at response node",
                            None,
                        );
                        break;
                    }
                }
                Err(err) => {
                    return self.fail(ctx, log, step_index, tag, err.to_string());
                }
            }
        }

        // No response node reached: the run still succeeds with the last
        // step's output.
        if state == RunState::Running {
            state = RunState::Succeeded;
            self.push(
                &mut log,
                &ctx,
                "interpreter",
                LogPhase::End,
                "execution finished without response node",
                None,
            );
        }

        tracing::info!("✅ Execution {} succeeded", ctx.execution_id);
        ExecutionReport {
            execution_id: ctx.execution_id,
            state,
            output: last_output,
            log,
            failing_step: None,
            error: None,
        }
    }

    fn fail(
        &self,
        ctx: ExecutionContext,
        mut log: Vec<ExecutionLogEntry>,
        step_index: usize,
        node_type: &str,
        message: String,
    ) -> ExecutionReport {
        self.push(
            &mut log,
            &ctx,
            node_type,
            LogPhase::Error,
            message.clone(),
            None,
        );
        tracing::warn!(
            "❌ Execution {} failed at step {}: {}",
            ctx.execution_id,
            step_index,
            message
        );
        ExecutionReport {
            execution_id: ctx.execution_id,
            state: RunState::Failed,
            output: Value::Null,
            log,
            failing_step: Some(step_index),
            error: Some(message),
        }
    }

    fn push(
        &self,
        log: &mut Vec<ExecutionLogEntry>,
        ctx: &ExecutionContext,
        node_type: &str,
        phase: LogPhase,
        message: impl Into<String>,
        payload: Option<Value>,
    ) {
        let entry = ExecutionLogEntry::new(
            &ctx.execution_id,
            ctx.step_index,
            node_type,
            phase,
            message,
            payload,
        );
        self.sink.append(&entry);
        log.push(entry);
    }
}

fn first_null_field(node: &Node) -> Option<&str> {
    node.fields
        .iter()
        .find(|(_, v)| v.is_null())
        .map(|(k, _)| k.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, NodeType};
    use crate::providers::memory::{MemoryDocumentStore, MemoryMailer};
    use crate::providers::token::JwtSigner;
    use crate::providers::DocumentStore;
    use crate::runtime::log::TracingSink;
    use crate::runtime::scheduler::{self, SchedulePolicy};
    use async_trait::async_trait;
    use serde_json::{json, Map};

    fn node(id: &str, node_type: NodeType, fields: Value) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            label: String::new(),
            fields: fields.as_object().cloned().unwrap_or_default(),
            is_new: false,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn signup_workflow() -> Workflow {
        let mut wf = Workflow::new("wf-signup", "owner-1");
        wf.nodes = vec![
            node("in", NodeType::Input, json!({})),
            node(
                "validate",
                NodeType::InputValidation,
                json!({"required": ["email"], "types": {"email": "string"}}),
            ),
            node(
                "save",
                NodeType::DbInsert,
                json!({"collection": "users", "document": {"email": "{{input.email}}"}}),
            ),
            node(
                "reply",
                NodeType::Response,
                json!({"status": 201, "body": {"created": "{{dbInsert.inserted._id}}"}}),
            ),
        ];
        wf.edges = vec![
            edge("e1", "in", "validate"),
            edge("e2", "validate", "save"),
            edge("e3", "save", "reply"),
        ];
        wf
    }

    fn interpreter_with(
        store: std::sync::Arc<dyn DocumentStore>,
    ) -> ExecutionInterpreter {
        let registry = ToolHandlerRegistry::with_builtins(
            store,
            Arc::new(JwtSigner::new("test-secret")),
            Arc::new(MemoryMailer::new()),
        );
        ExecutionInterpreter::new(registry, Arc::new(TracingSink))
    }

    #[tokio::test]
    async fn signup_chain_executes_in_order_and_returns_response() {
        let wf = signup_workflow();
        let order = scheduler::order(
            &wf,
            SchedulePolicy { skip_input_nodes: true },
        )
        .unwrap();
        let interpreter = interpreter_with(Arc::new(MemoryDocumentStore::new()));

        let report = interpreter
            .interpret(&wf, &order, json!({"email": "a@b.c"}))
            .await;

        assert!(report.success());
        assert_eq!(report.output["status"], json!(201));
        assert_eq!(report.output["body"]["created"], json!(1));

        // Phases arrive in execution order, ending at the response node.
        let phases: Vec<_> = report.log.iter().map(|e| e.phase).collect();
        assert_eq!(*phases.last().unwrap(), LogPhase::End);
        let types: Vec<_> = report
            .log
            .iter()
            .filter(|e| e.phase == LogPhase::Start)
            .map(|e| e.node_type.clone())
            .collect();
        assert_eq!(types, vec!["inputValidation", "dbInsert", "response"]);
    }

    #[tokio::test]
    async fn validation_failure_stops_before_db_insert() {
        let wf = signup_workflow();
        let order = scheduler::order(
            &wf,
            SchedulePolicy { skip_input_nodes: true },
        )
        .unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let interpreter = interpreter_with(store.clone());

        let report = interpreter.interpret(&wf, &order, json!({})).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failing_step, Some(0));
        assert!(report.error.as_deref().unwrap().contains("email"));
        // Nothing was persisted.
        let found = store.find("users", &Map::new(), None).await.unwrap();
        assert!(found.is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn find(
            &self,
            _: &str,
            _: &Map<String, Value>,
            _: Option<u64>,
        ) -> anyhow::Result<Vec<Value>> {
            anyhow::bail!("store unavailable")
        }
        async fn insert(&self, _: &str, _: &Value) -> anyhow::Result<Value> {
            anyhow::bail!("store unavailable")
        }
        async fn update(
            &self,
            _: &str,
            _: &Map<String, Value>,
            _: &Value,
        ) -> anyhow::Result<u64> {
            anyhow::bail!("store unavailable")
        }
        async fn delete(&self, _: &str, _: &Map<String, Value>) -> anyhow::Result<u64> {
            anyhow::bail!("store unavailable")
        }
    }

    #[tokio::test]
    async fn handler_failure_reports_step_and_partial_log() {
        let wf = signup_workflow();
        let order = scheduler::order(
            &wf,
            SchedulePolicy { skip_input_nodes: true },
        )
        .unwrap();
        let interpreter = interpreter_with(Arc::new(FailingStore));

        let report = interpreter
            .interpret(&wf, &order, json!({"email": "a@b.c"}))
            .await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failing_step, Some(1));
        assert!(report.error.as_deref().unwrap().contains("store unavailable"));
        // The validation step completed before the failure.
        assert!(report
            .log
            .iter()
            .any(|e| e.node_type == "inputValidation" && e.phase == LogPhase::Success));
        assert_eq!(report.log.last().unwrap().phase, LogPhase::Error);
        // The response node never ran.
        assert!(!report.log.iter().any(|e| e.node_type == "response"));
    }

    #[tokio::test]
    async fn null_resolved_required_field_fails_before_handler() {
        let mut wf = signup_workflow();
        // An exact-match reference to a missing path resolves to null.
        wf.nodes[2]
            .fields
            .insert("document".to_string(), json!("{{missing.path}}"));
        let order = scheduler::order(
            &wf,
            SchedulePolicy { skip_input_nodes: true },
        )
        .unwrap();
        let interpreter = interpreter_with(Arc::new(MemoryDocumentStore::new()));
        let report = interpreter
            .interpret(&wf, &order, json!({"email": "a@b.c"}))
            .await;
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failing_step, Some(1));
        assert!(report.error.as_deref().unwrap().contains("document"));
    }

    #[tokio::test]
    async fn workflow_without_response_returns_last_output() {
        let mut wf = Workflow::new("wf-find", "owner-1");
        wf.nodes = vec![node(
            "lookup",
            NodeType::DbFind,
            json!({"collection": "users", "filter": {}}),
        )];
        let order = scheduler::order(&wf, SchedulePolicy::default()).unwrap();
        let interpreter = interpreter_with(Arc::new(MemoryDocumentStore::new()));

        let report = interpreter.interpret(&wf, &order, json!({})).await;
        assert!(report.success());
        assert_eq!(report.output["documents"], json!([]));
    }
}
