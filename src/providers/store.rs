/// SQLite-backed JSON document store
///
/// One table per collection, documents stored as a JSON column with an
/// autoincrement id. Filtering happens in Rust over the decoded documents,
/// so collection names are the only SQL surface and are validated as plain
/// identifiers.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqlitePool, Row};

use super::{matches_filter, DocumentStore};

#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Collection names become table names; reject anything that is not a
    /// plain identifier.
    fn table_name(collection: &str) -> anyhow::Result<String> {
        if collection.is_empty()
            || !collection.chars().all(|c| c.is_alphanumeric() || c == '_')
        {
            anyhow::bail!("invalid collection name: {collection}");
        }
        Ok(format!("doc_{collection}"))
    }

    async fn ensure_collection(&self, table: &str) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document JSON NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch every (row id, decoded document) pair of a collection.
    async fn load_all(&self, table: &str) -> anyhow::Result<Vec<(i64, Value)>> {
        let rows = sqlx::query(&format!("SELECT id, document FROM {table} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let raw: String = row.get("document");
            let mut document: Value = serde_json::from_str(&raw)?;
            if let Value::Object(obj) = &mut document {
                obj.insert("_id".to_string(), Value::from(id));
            }
            documents.push((id, document));
        }
        Ok(documents)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: Option<u64>,
    ) -> anyhow::Result<Vec<Value>> {
        let table = Self::table_name(collection)?;
        self.ensure_collection(&table).await?;

        let limit = limit.unwrap_or(100) as usize;
        let documents = self
            .load_all(&table)
            .await?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| matches_filter(doc, filter))
            .take(limit)
            .collect::<Vec<_>>();

        tracing::debug!(
            "📖 Found {} document(s) in collection '{}'",
            documents.len(),
            collection
        );
        Ok(documents)
    }

    async fn insert(&self, collection: &str, document: &Value) -> anyhow::Result<Value> {
        let table = Self::table_name(collection)?;
        self.ensure_collection(&table).await?;

        let raw = serde_json::to_string(document)?;
        let result = sqlx::query(&format!("INSERT INTO {table} (document) VALUES (?)"))
            .bind(&raw)
            .execute(&self.pool)
            .await?;

        let mut stored = document.clone();
        if let Value::Object(obj) = &mut stored {
            obj.insert("_id".to_string(), Value::from(result.last_insert_rowid()));
        }
        tracing::debug!(
            "💾 Inserted document into '{}' (id {})",
            collection,
            result.last_insert_rowid()
        );
        Ok(stored)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        update: &Value,
    ) -> anyhow::Result<u64> {
        let table = Self::table_name(collection)?;
        self.ensure_collection(&table).await?;

        let update_fields = update
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("update must be a JSON object"))?;

        let mut touched = 0;
        for (id, mut document) in self.load_all(&table).await? {
            if !matches_filter(&document, filter) {
                continue;
            }
            if let Value::Object(obj) = &mut document {
                obj.remove("_id");
                for (key, value) in update_fields {
                    obj.insert(key.clone(), value.clone());
                }
            }
            sqlx::query(&format!("UPDATE {table} SET document = ? WHERE id = ?"))
                .bind(serde_json::to_string(&document)?)
                .bind(id)
                .execute(&self.pool)
                .await?;
            touched += 1;
        }
        tracing::debug!("✏️ Updated {} document(s) in '{}'", touched, collection);
        Ok(touched)
    }

    async fn delete(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> anyhow::Result<u64> {
        let table = Self::table_name(collection)?;
        self.ensure_collection(&table).await?;

        let mut removed = 0;
        for (id, document) in self.load_all(&table).await? {
            if !matches_filter(&document, filter) {
                continue;
            }
            sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
                .bind(id)
                .execute(&self.pool)
                .await?;
            removed += 1;
        }
        tracing::debug!("🗑️ Deleted {} document(s) from '{}'", removed, collection);
        Ok(removed)
    }
}
