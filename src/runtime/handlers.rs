/// Tool handler registry and builtin handlers
///
/// One handler per node type. The interpreter resolves template references
/// in a node's fields, then dispatches here; a handler parses its typed
/// config, performs its effect through the injected providers, and returns
/// a JSON output to publish into the execution scope.
///
/// Handlers return `anyhow::Result` so provider errors flow through
/// unchanged; the interpreter attaches the failing step index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::graph::{Node, NodeConfig, NodeType};
use crate::providers::{DocumentStore, Mailer, TokenSigner};
use crate::runtime::context::ExecutionContext;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute one node. `node.fields` arrive with template references
    /// already resolved against the current variable scope.
    async fn run(&self, node: &Node, ctx: &mut ExecutionContext) -> anyhow::Result<Value>;
}

/// Maps each node type to its handler. Cloning shares the handler set.
#[derive(Clone, Default)]
pub struct ToolHandlerRegistry {
    handlers: HashMap<NodeType, Arc<dyn ToolHandler>>,
}

impl ToolHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a node type.
    pub fn register(&mut self, node_type: NodeType, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(node_type, handler);
    }

    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(&node_type).cloned()
    }

    /// Registry wired with every builtin handler.
    pub fn with_builtins(
        store: Arc<dyn DocumentStore>,
        signer: Arc<dyn TokenSigner>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(
            NodeType::InputValidation,
            Arc::new(InputValidationHandler),
        );
        registry.register(
            NodeType::DbFind,
            Arc::new(DbFindHandler { store: store.clone() }),
        );
        registry.register(
            NodeType::DbInsert,
            Arc::new(DbInsertHandler { store: store.clone() }),
        );
        registry.register(
            NodeType::DbUpdate,
            Arc::new(DbUpdateHandler { store: store.clone() }),
        );
        registry.register(NodeType::DbDelete, Arc::new(DbDeleteHandler { store }));
        registry.register(
            NodeType::AuthMiddleware,
            Arc::new(AuthMiddlewareHandler { signer: signer.clone() }),
        );
        registry.register(NodeType::JwtGenerate, Arc::new(JwtGenerateHandler { signer }));
        registry.register(NodeType::EmailSend, Arc::new(EmailSendHandler { mailer }));
        registry.register(NodeType::Delay, Arc::new(DelayHandler));
        registry.register(NodeType::Response, Arc::new(ResponseHandler));
        registry
    }
}

/// Checks the invocation payload against the node's required-field list and
/// optional type map; fails the execution when the payload falls short.
pub struct InputValidationHandler;

#[async_trait]
impl ToolHandler for InputValidationHandler {
    async fn run(&self, node: &Node, ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::InputValidation { required, types } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let input = ctx.vars.get("input").cloned().unwrap_or(Value::Null);
        let payload = input
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("input payload is not an object"))?;

        for field in &required {
            match payload.get(field) {
                None | Some(Value::Null) => {
                    anyhow::bail!("missing required input field '{field}'")
                }
                Some(_) => {}
            }
        }
        for (field, expected) in &types {
            let Some(expected) = expected.as_str() else { continue };
            let Some(actual) = payload.get(field) else { continue };
            if !type_matches(actual, expected) {
                anyhow::bail!(
                    "input field '{field}' has wrong type, expected {expected}"
                );
            }
        }
        Ok(json!({"valid": true, "checked": required}))
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

pub struct DbFindHandler {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for DbFindHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::DbFind { collection, filter, limit } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let documents = self.store.find(&collection, &filter, limit).await?;
        Ok(json!({"documents": documents}))
    }
}

pub struct DbInsertHandler {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for DbInsertHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::DbInsert { collection, document } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let stored = self.store.insert(&collection, &document).await?;
        Ok(json!({"inserted": stored}))
    }
}

pub struct DbUpdateHandler {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for DbUpdateHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::DbUpdate { collection, filter, update } =
            NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let touched = self.store.update(&collection, &filter, &update).await?;
        Ok(json!({"matched": touched}))
    }
}

pub struct DbDeleteHandler {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl ToolHandler for DbDeleteHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::DbDelete { collection, filter } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let removed = self.store.delete(&collection, &filter).await?;
        Ok(json!({"deleted": removed}))
    }
}

/// Verifies the configured token and publishes its claims under `auth` so
/// downstream nodes can reference `{{auth.sub}}` and friends.
pub struct AuthMiddlewareHandler {
    signer: Arc<dyn TokenSigner>,
}

#[async_trait]
impl ToolHandler for AuthMiddlewareHandler {
    async fn run(&self, node: &Node, ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::AuthMiddleware { token } = NodeConfig::from_node(node)? else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let claims = self
            .signer
            .verify(&token)
            .map_err(|e| anyhow::anyhow!("token verification failed: {e}"))?;
        ctx.vars.insert("auth".to_string(), claims.clone());
        Ok(claims)
    }
}

pub struct JwtGenerateHandler {
    signer: Arc<dyn TokenSigner>,
}

#[async_trait]
impl ToolHandler for JwtGenerateHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::JwtGenerate { payload, ttl_secs } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        let token = self.signer.sign(&payload, ttl_secs)?;
        Ok(json!({"token": token, "expiresIn": ttl_secs}))
    }
}

pub struct EmailSendHandler {
    mailer: Arc<dyn Mailer>,
}

#[async_trait]
impl ToolHandler for EmailSendHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::EmailSend { to, subject, body } = NodeConfig::from_node(node)?
        else {
            anyhow::bail!("handler bound to wrong node type");
        };
        self.mailer.send(&to, &subject, &body).await?;
        Ok(json!({"sent": true, "to": to}))
    }
}

/// Non-durable pause; a dropped execution future cancels the wait.
pub struct DelayHandler;

#[async_trait]
impl ToolHandler for DelayHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::Delay { ms } = NodeConfig::from_node(node)? else {
            anyhow::bail!("handler bound to wrong node type");
        };
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        Ok(json!({"delayedMs": ms}))
    }
}

/// Terminal node: shapes the HTTP-visible result of the execution.
pub struct ResponseHandler;

#[async_trait]
impl ToolHandler for ResponseHandler {
    async fn run(&self, node: &Node, _ctx: &mut ExecutionContext) -> anyhow::Result<Value> {
        let NodeConfig::Response { status, body } = NodeConfig::from_node(node)? else {
            anyhow::bail!("handler bound to wrong node type");
        };
        Ok(json!({"status": status, "body": body}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::{MemoryDocumentStore, MemoryMailer};
    use crate::providers::token::JwtSigner;
    use serde_json::Map;

    fn node(node_type: NodeType, fields: Value) -> Node {
        Node {
            id: "n1".to_string(),
            node_type,
            label: String::new(),
            fields: fields.as_object().cloned().unwrap_or_default(),
            is_new: false,
        }
    }

    fn ctx(input: Value) -> ExecutionContext {
        ExecutionContext::new("wf-1", "owner-1", input)
    }

    fn test_registry() -> (ToolHandlerRegistry, Arc<MemoryDocumentStore>, Arc<MemoryMailer>)
    {
        let store = Arc::new(MemoryDocumentStore::new());
        let mailer = Arc::new(MemoryMailer::new());
        let signer = Arc::new(JwtSigner::new("test-secret"));
        let registry = ToolHandlerRegistry::with_builtins(
            store.clone(),
            signer,
            mailer.clone(),
        );
        (registry, store, mailer)
    }

    #[tokio::test]
    async fn input_validation_passes_and_fails() {
        let handler = InputValidationHandler;
        let n = node(
            NodeType::InputValidation,
            json!({"required": ["email"], "types": {"email": "string"}}),
        );

        let mut ok = ctx(json!({"email": "a@b.c"}));
        assert!(handler.run(&n, &mut ok).await.is_ok());

        let mut missing = ctx(json!({}));
        let err = handler.run(&n, &mut missing).await.unwrap_err();
        assert!(err.to_string().contains("email"));

        let mut wrong_type = ctx(json!({"email": 42}));
        assert!(handler.run(&n, &mut wrong_type).await.is_err());
    }

    #[tokio::test]
    async fn db_insert_then_find_through_registry() {
        let (registry, _store, _) = test_registry();
        let mut c = ctx(json!({}));

        let insert = node(
            NodeType::DbInsert,
            json!({"collection": "users", "document": {"email": "a@b.c"}}),
        );
        let handler = registry.get(NodeType::DbInsert).unwrap();
        let out = handler.run(&insert, &mut c).await.unwrap();
        assert!(out["inserted"]["_id"].is_number());

        let find = node(
            NodeType::DbFind,
            json!({"collection": "users", "filter": {"email": "a@b.c"}}),
        );
        let handler = registry.get(NodeType::DbFind).unwrap();
        let out = handler.run(&find, &mut c).await.unwrap();
        assert_eq!(out["documents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auth_middleware_publishes_claims() {
        let signer = Arc::new(JwtSigner::new("test-secret"));
        let mut payload = Map::new();
        payload.insert("sub".to_string(), json!("user-7"));
        let token = signer.sign(&payload, 60).unwrap();

        let handler = AuthMiddlewareHandler { signer };
        let n = node(NodeType::AuthMiddleware, json!({"token": token}));
        let mut c = ctx(json!({}));
        handler.run(&n, &mut c).await.unwrap();
        assert_eq!(c.vars["auth"]["sub"], json!("user-7"));
    }

    #[tokio::test]
    async fn auth_middleware_rejects_garbage_token() {
        let signer = Arc::new(JwtSigner::new("test-secret"));
        let handler = AuthMiddlewareHandler { signer };
        let n = node(NodeType::AuthMiddleware, json!({"token": "not-a-token"}));
        let mut c = ctx(json!({}));
        assert!(handler.run(&n, &mut c).await.is_err());
    }

    #[tokio::test]
    async fn email_send_records_message() {
        let (registry, _, mailer) = test_registry();
        let n = node(
            NodeType::EmailSend,
            json!({"to": "a@b.c", "subject": "hi", "body": "welcome"}),
        );
        let handler = registry.get(NodeType::EmailSend).unwrap();
        handler.run(&n, &mut ctx(json!({}))).await.unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@b.c");
    }

    #[tokio::test]
    async fn response_echoes_status_and_body() {
        let handler = ResponseHandler;
        let n = node(
            NodeType::Response,
            json!({"status": 201, "body": {"ok": true}}),
        );
        let out = handler.run(&n, &mut ctx(json!({}))).await.unwrap();
        assert_eq!(out, json!({"status": 201, "body": {"ok": true}}));
    }
}
