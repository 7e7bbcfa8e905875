/// In-memory workflow registry
///
/// Read-mostly cache in front of storage. Lookups go through an `ArcSwap`
/// snapshot so the execution path never takes a lock; writes clone the map,
/// apply the change and swap. Mutations additionally serialize per workflow
/// through a lock map, so two concurrent deltas against the same graph are
/// applied one after the other while different workflows stay independent.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, RwLock};

use crate::error::EngineResult;
use crate::graph::Workflow;
use crate::workflow::storage::WorkflowStorage;

pub struct WorkflowRegistry {
    storage: WorkflowStorage,
    cache: ArcSwap<HashMap<String, Arc<Workflow>>>,
    mutation_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowRegistry {
    pub fn new(storage: WorkflowStorage) -> Self {
        Self {
            storage,
            cache: ArcSwap::from_pointee(HashMap::new()),
            mutation_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Cached lookup, falling back to storage on a miss.
    pub async fn get(&self, workflow_id: &str) -> EngineResult<Arc<Workflow>> {
        if let Some(found) = self.cache.load().get(workflow_id) {
            return Ok(found.clone());
        }
        let loaded = Arc::new(self.storage.load(workflow_id).await?);
        self.insert_cached(loaded.clone());
        Ok(loaded)
    }

    /// Persist a workflow and refresh the cache snapshot.
    pub async fn upsert(&self, workflow: Workflow) -> EngineResult<Arc<Workflow>> {
        self.storage.save(&workflow).await?;
        let shared = Arc::new(workflow);
        self.insert_cached(shared.clone());
        Ok(shared)
    }

    pub async fn list(&self, owner_id: &str) -> EngineResult<Vec<Workflow>> {
        self.storage.list(owner_id).await
    }

    pub async fn remove(&self, workflow_id: &str) -> EngineResult<bool> {
        let removed = self.storage.delete(workflow_id).await?;
        let mut next: HashMap<_, _> = self.cache.load().as_ref().clone();
        next.remove(workflow_id);
        self.cache.store(Arc::new(next));
        self.mutation_locks.write().await.remove(workflow_id);
        Ok(removed)
    }

    /// Per-workflow mutation lock, created on first use.
    pub async fn mutation_lock(&self, workflow_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.mutation_locks.read().await;
            if let Some(lock) = locks.get(workflow_id) {
                return lock.clone();
            }
        }
        let mut locks = self.mutation_locks.write().await;
        // Re-check after acquiring the write lock.
        locks
            .entry(workflow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn insert_cached(&self, workflow: Arc<Workflow>) {
        let mut next: HashMap<_, _> = self.cache.load().as_ref().clone();
        next.insert(workflow.workflow_id.clone(), workflow);
        self.cache.store(Arc::new(next));
    }
}
