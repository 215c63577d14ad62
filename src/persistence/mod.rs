//! Durable storage for runs
//!
//! Stores are collaborators, not part of the tick: the scheduler saves in
//! background tasks and never waits on a store before continuing. A failed
//! load is treated as "not found".

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::error::MazeError;
use crate::core::types::RunId;
use crate::simulation::run::Run;

pub use file::JsonFileRunStore;
pub use memory::InMemoryRunStore;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<PersistenceError> for MazeError {
    fn from(err: PersistenceError) -> Self {
        MazeError::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait RunStore: Send + Sync + 'static {
    async fn save(&self, run: &Run) -> Result<(), PersistenceError>;

    async fn load(&self, id: RunId) -> Result<Option<Run>, PersistenceError>;

    async fn delete(&self, id: RunId) -> Result<bool, PersistenceError>;

    async fn list(&self) -> Result<Vec<RunId>, PersistenceError>;

    fn name(&self) -> &str;
}

/// Load a run, logging and swallowing store failures
pub async fn load_or_none(store: &dyn RunStore, id: RunId) -> Option<Run> {
    match store.load(id).await {
        Ok(run) => run,
        Err(err) => {
            tracing::warn!(run_id = %id, store = store.name(), error = %err, "Run load failed, treating as not found");
            None
        }
    }
}

/// Save a run, logging failures. Returns whether the save succeeded.
pub async fn save_logged(store: &dyn RunStore, run: &Run) -> bool {
    match store.save(run).await {
        Ok(()) => {
            tracing::debug!(run_id = %run.id, turn = run.turn, store = store.name(), "Run saved");
            true
        }
        Err(err) => {
            tracing::warn!(run_id = %run.id, store = store.name(), error = %err, "Run save failed, continuing in memory");
            false
        }
    }
}
