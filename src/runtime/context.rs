/// Per-execution variable scope
///
/// Created fresh for every invocation, discarded afterwards; never persisted
/// beyond the execution log. The `vars` map grows monotonically as handlers
/// publish their output; values are plain JSON so template resolution never
/// needs object-model-specific unwrapping.

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub owner_id: String,
    /// Shared mutable scope keyed by variable name; the invocation payload
    /// seeds `vars["input"]`, each handler's output lands under its
    /// node-type tag (and node id, when the two differ).
    pub vars: Map<String, Value>,
    pub step_index: usize,
}

impl ExecutionContext {
    /// Fresh context for one run, seeding `input` from the request payload.
    pub fn new(workflow_id: &str, owner_id: &str, input: Value) -> Self {
        let mut vars = Map::new();
        vars.insert("input".to_string(), input);
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            owner_id: owner_id.to_string(),
            vars,
            step_index: 0,
        }
    }

    /// Publish a handler's output under the node-type key, and under the
    /// node id as well when it differs, so same-typed nodes stay
    /// distinguishable in templates.
    pub fn publish(&mut self, type_tag: &str, node_id: &str, output: Value) {
        self.vars.insert(type_tag.to_string(), output.clone());
        if node_id != type_tag {
            self.vars.insert(node_id.to_string(), output);
        }
    }
}
