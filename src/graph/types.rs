/// Core workflow graph type definitions
///
/// Defines the structures for workflows, nodes, edges and proposal deltas.
/// These types are serialized/deserialized from JSON for persistence and for
/// the builder API, so field names follow the camelCase wire convention.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of node types the interpreter knows how to dispatch.
///
/// Adding a tool means adding a variant here, a `NodeConfig` contract, and a
/// handler registration; the interpreter itself never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    /// Entry marker seeding the `input` variable; never executed as a step
    Input,
    DbFind,
    DbInsert,
    DbUpdate,
    DbDelete,
    InputValidation,
    AuthMiddleware,
    EmailSend,
    JwtGenerate,
    Delay,
    /// Terminal node producing the HTTP-visible result; at most one per graph
    Response,
}

impl NodeType {
    /// The camelCase tag used on the wire and as the vars key for handler
    /// output (e.g. a dbFind result lands under `vars["dbFind"]`).
    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::DbFind => "dbFind",
            NodeType::DbInsert => "dbInsert",
            NodeType::DbUpdate => "dbUpdate",
            NodeType::DbDelete => "dbDelete",
            NodeType::InputValidation => "inputValidation",
            NodeType::AuthMiddleware => "authMiddleware",
            NodeType::EmailSend => "emailSend",
            NodeType::JwtGenerate => "jwtGenerate",
            NodeType::Delay => "delay",
            NodeType::Response => "response",
        }
    }

    /// Node types whose configured fields must all be non-null before the
    /// handler is invoked (fail fast, not at the data layer).
    pub fn requires_complete_fields(&self) -> bool {
        matches!(
            self,
            NodeType::EmailSend | NodeType::DbInsert | NodeType::DbUpdate
        )
    }
}

/// A single typed step in a workflow graph.
///
/// Owned exclusively by its `Workflow`; created by the mutation engine and
/// never shared between graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the workflow (e.g. "n1", "send-welcome")
    pub id: String,
    /// The type tag that determines execution behavior
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Human-readable label shown in the builder UI
    #[serde(default)]
    pub label: String,
    /// Node-type-specific configuration (see `NodeConfig` for contracts)
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Transient annotation set by the mutation engine on freshly appended
    /// nodes; cleared again on the next merge pass
    #[serde(rename = "isNew", default, skip_serializing_if = "is_false")]
    pub is_new: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
}

/// A complete workflow definition: one generated API.
///
/// `nodes` keeps insertion order; that order is the deterministic tie-break
/// for scheduling, not necessarily the execution order itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Workflow {
    /// Create an empty workflow owned by `owner_id`.
    pub fn new(workflow_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            workflow_id: workflow_id.into(),
            owner_id: owner_id.into(),
            name: String::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A proposed partial set of nodes and edges to merge into an existing graph.
///
/// Deltas come from an LLM call or an explicit user edit and are untrusted:
/// every delta passes through the mutation engine's validation before any of
/// it reaches a persisted workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDelta {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Typed view of a node's `fields` bag, one variant per node type.
///
/// Parsed at mutation time so a delta with a broken field contract is
/// rejected before it is persisted, rather than blowing up mid-execution.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Input,
    InputValidation {
        required: Vec<String>,
        types: Map<String, Value>,
    },
    DbFind {
        collection: String,
        filter: Map<String, Value>,
        limit: Option<u64>,
    },
    DbInsert {
        collection: String,
        document: Value,
    },
    DbUpdate {
        collection: String,
        filter: Map<String, Value>,
        update: Value,
    },
    DbDelete {
        collection: String,
        filter: Map<String, Value>,
    },
    AuthMiddleware {
        token: String,
    },
    EmailSend {
        to: String,
        subject: String,
        body: String,
    },
    JwtGenerate {
        payload: Map<String, Value>,
        ttl_secs: u64,
    },
    Delay {
        ms: u64,
    },
    Response {
        status: u16,
        body: Value,
    },
}

impl NodeConfig {
    /// Parse and check the field contract for `node`.
    ///
    /// Returns a `Configuration` error naming the node and the missing or
    /// mistyped field. Template placeholders (`{{...}}`) are legal values
    /// everywhere a string is accepted; they resolve at execution time.
    pub fn from_node(node: &Node) -> Result<Self, crate::error::EngineError> {
        let f = &node.fields;
        match node.node_type {
            NodeType::Input => Ok(NodeConfig::Input),
            NodeType::InputValidation => Ok(NodeConfig::InputValidation {
                required: string_list(node, f, "required")?,
                types: f
                    .get("types")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default(),
            }),
            NodeType::DbFind => Ok(NodeConfig::DbFind {
                collection: required_string(node, f, "collection")?,
                filter: object_or_empty(f, "filter"),
                limit: f.get("limit").and_then(|v| v.as_u64()),
            }),
            NodeType::DbInsert => Ok(NodeConfig::DbInsert {
                collection: required_string(node, f, "collection")?,
                document: required_value(node, f, "document")?,
            }),
            NodeType::DbUpdate => Ok(NodeConfig::DbUpdate {
                collection: required_string(node, f, "collection")?,
                filter: required_object(node, f, "filter")?,
                update: required_value(node, f, "update")?,
            }),
            NodeType::DbDelete => Ok(NodeConfig::DbDelete {
                collection: required_string(node, f, "collection")?,
                filter: object_or_empty(f, "filter"),
            }),
            NodeType::AuthMiddleware => Ok(NodeConfig::AuthMiddleware {
                token: required_string(node, f, "token")?,
            }),
            NodeType::EmailSend => Ok(NodeConfig::EmailSend {
                to: required_string(node, f, "to")?,
                subject: required_string(node, f, "subject")?,
                body: required_string(node, f, "body")?,
            }),
            NodeType::JwtGenerate => Ok(NodeConfig::JwtGenerate {
                payload: required_object(node, f, "payload")?,
                ttl_secs: f.get("ttlSecs").and_then(|v| v.as_u64()).unwrap_or(3600),
            }),
            NodeType::Delay => Ok(NodeConfig::Delay {
                ms: f
                    .get("ms")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| missing(node, "ms"))?,
            }),
            NodeType::Response => Ok(NodeConfig::Response {
                status: f
                    .get("status")
                    .and_then(|v| v.as_u64())
                    .and_then(|s| u16::try_from(s).ok())
                    .ok_or_else(|| missing(node, "status"))?,
                body: required_value(node, f, "body")?,
            }),
        }
    }
}

fn missing(node: &Node, field: &str) -> crate::error::EngineError {
    crate::error::EngineError::Configuration(format!(
        "node '{}' ({}) is missing required field '{}'",
        node.id,
        node.node_type.tag(),
        field
    ))
}

fn required_string(
    node: &Node,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<String, crate::error::EngineError> {
    fields
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| missing(node, key))
}

fn required_value(
    node: &Node,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Value, crate::error::EngineError> {
    match fields.get(key) {
        Some(Value::Null) | None => Err(missing(node, key)),
        Some(v) => Ok(v.clone()),
    }
}

fn required_object(
    node: &Node,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Map<String, Value>, crate::error::EngineError> {
    fields
        .get(key)
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| missing(node, key))
}

fn object_or_empty(fields: &Map<String, Value>, key: &str) -> Map<String, Value> {
    fields
        .get(key)
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default()
}

fn string_list(
    node: &Node,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, crate::error::EngineError> {
    fields
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .ok_or_else(|| missing(node, key))
}
