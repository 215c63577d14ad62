use ahash::AHashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::types::RunId;
use crate::persistence::{PersistenceError, RunStore};
use crate::simulation::run::Run;

/// Keeps serialized runs in memory. Round-trips through JSON so a stored run
/// is a snapshot, not a live reference.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: RwLock<AHashMap<RunId, String>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, run: &Run) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(run)?;
        self.runs.write().await.insert(run.id, json);
        Ok(())
    }

    async fn load(&self, id: RunId) -> Result<Option<Run>, PersistenceError> {
        match self.runs.read().await.get(&id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: RunId) -> Result<bool, PersistenceError> {
        Ok(self.runs.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<RunId>, PersistenceError> {
        let mut ids: Vec<RunId> = self.runs.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
