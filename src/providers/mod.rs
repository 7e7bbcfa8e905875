/// Side-effect collaborator interfaces
///
/// The handler registry holds no business logic of its own: database access,
/// mail delivery and token signing are injected behind these traits, so a
/// deployment can swap backends without touching the interpreter. Provider
/// failures are plain `anyhow` errors; the interpreter attaches the step
/// index when it surfaces them.

pub mod mailer;
pub mod memory;
pub mod store;
pub mod token;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Persistent JSON-document store keyed by collection.
///
/// `filter` is matched by shallow field equality: a document matches when
/// every filter key is present with an equal value.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Value>>;

    /// Insert one document; returns the stored document including its
    /// assigned `_id`.
    async fn insert(&self, collection: &str, document: &Value) -> anyhow::Result<Value>;

    /// Shallow-merge `update` into every matching document; returns the
    /// number of documents touched.
    async fn update(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        update: &Value,
    ) -> anyhow::Result<u64>;

    /// Delete matching documents; returns the number removed.
    async fn delete(&self, collection: &str, filter: &Map<String, Value>)
        -> anyhow::Result<u64>;
}

/// Outbound mail collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Token signing/verification collaborator for jwtGenerate and
/// authMiddleware nodes.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, payload: &Map<String, Value>, ttl_secs: u64) -> anyhow::Result<String>;
    /// Verify a token and return its claims; failure means the token is
    /// invalid or expired.
    fn verify(&self, token: &str) -> anyhow::Result<Value>;
}

/// Shallow field-equality match used by the store implementations.
pub(crate) fn matches_filter(document: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        document.get(key).map(|actual| actual == expected).unwrap_or(false)
    })
}
