/// Workflow persistence over SQLite
///
/// Workflow definitions are stored as a JSON column keyed by workflow id.
/// The registry in front of this layer handles caching; storage stays a
/// thin read/write surface.

use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{EngineError, EngineResult};
use crate::graph::Workflow;

#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> EngineResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS workflows (
                workflow_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                definition JSON NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;
        tracing::info!("✅ Workflow schema ready");
        Ok(())
    }

    /// Insert or replace a workflow definition.
    pub async fn save(&self, workflow: &Workflow) -> EngineResult<()> {
        let definition = serde_json::to_string(workflow)?;
        sqlx::query(
            "INSERT INTO workflows (workflow_id, owner_id, name, definition, updated_at)
             VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(workflow_id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&workflow.workflow_id)
        .bind(&workflow.owner_id)
        .bind(&workflow.name)
        .bind(&definition)
        .execute(&self.pool)
        .await?;
        tracing::debug!("💾 Saved workflow '{}'", workflow.workflow_id);
        Ok(())
    }

    pub async fn load(&self, workflow_id: &str) -> EngineResult<Workflow> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(workflow_id.to_string()))?;
        let definition: String = row.get("definition");
        Ok(serde_json::from_str(&definition)?)
    }

    /// Every workflow owned by `owner_id`, newest first.
    pub async fn list(&self, owner_id: &str) -> EngineResult<Vec<Workflow>> {
        let rows = sqlx::query(
            "SELECT definition FROM workflows WHERE owner_id = ? ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            let definition: String = row.get("definition");
            workflows.push(serde_json::from_str(&definition)?);
        }
        Ok(workflows)
    }

    pub async fn delete(&self, workflow_id: &str) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
