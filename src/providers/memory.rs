/// In-memory provider implementations
///
/// Used for local development and throughout the test suite; semantics match
/// the SQLite store (shallow filter equality, `_id` assignment, shallow
/// update merge).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{matches_filter, DocumentStore, Mailer};

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    next_id: Mutex<i64>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Value>> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filter(doc, filter))
                    .take(limit.unwrap_or(100) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, document: &Value) -> anyhow::Result<Value> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let mut stored = document.clone();
        if let Value::Object(obj) = &mut stored {
            obj.insert("_id".to_string(), Value::from(id));
        }
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        update: &Value,
    ) -> anyhow::Result<u64> {
        let update_fields = update
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("update must be a JSON object"))?;
        let mut collections = self.collections.lock().unwrap();
        let mut touched = 0;
        if let Some(docs) = collections.get_mut(collection) {
            for doc in docs.iter_mut() {
                if matches_filter(doc, filter) {
                    if let Value::Object(obj) = doc {
                        for (key, value) in update_fields {
                            obj.insert(key.clone(), value.clone());
                        }
                    }
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn delete(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> anyhow::Result<u64> {
        let mut collections = self.collections.lock().unwrap();
        let mut removed = 0;
        if let Some(docs) = collections.get_mut(collection) {
            let before = docs.len();
            docs.retain(|doc| !matches_filter(doc, filter));
            removed = (before - docs.len()) as u64;
        }
        Ok(removed)
    }
}

/// Records sent messages for assertions.
#[derive(Default)]
pub struct MemoryMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
