use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::types::RunId;
use crate::persistence::{PersistenceError, RunStore};
use crate::simulation::run::Run;

/// One pretty-printed JSON file per run under a directory
pub struct JsonFileRunStore {
    dir: PathBuf,
}

impl JsonFileRunStore {
    /// Create the store, creating `dir` if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: RunId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl RunStore for JsonFileRunStore {
    async fn save(&self, run: &Run) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(run)?;
        // write then rename so readers never see a half-written file
        let tmp = self.dir.join(format!("{}.json.tmp", run.id));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path_for(run.id)).await?;
        Ok(())
    }

    async fn load(&self, id: RunId) -> Result<Option<Run>, PersistenceError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, id: RunId) -> Result<bool, PersistenceError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> Result<Vec<RunId>, PersistenceError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<RunId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::agent::AgentSpec;
    use crate::persistence::load_or_none;
    use crate::rules::ruleset::Ruleset;
    use crate::simulation::run::RunConfig;
    use crate::world::maze::MazeDefinition;

    fn run() -> Run {
        let maze = MazeDefinition::new("t", "Test", &["#####", "#S.C#", "#####"]);
        Run::new(&RunConfig::new(maze, Ruleset::default(), vec![AgentSpec::named("a")])).unwrap()
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRunStore::open(dir.path().join("runs")).await.unwrap();
        let run = run();
        store.save(&run).await.unwrap();
        assert!(store.dir().join(format!("{}.json", run.id)).exists());
        assert_eq!(store.load(run.id).await.unwrap(), Some(run.clone()));
        assert_eq!(store.list().await.unwrap(), vec![run.id]);
        assert!(store.delete(run.id).await.unwrap());
        assert_eq!(store.load(run.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRunStore::open(dir.path()).await.unwrap();
        let id = RunId::new();
        tokio::fs::write(dir.path().join(format!("{}.json", id)), b"{not json").await.unwrap();
        assert!(store.load(id).await.is_err());
        assert!(load_or_none(&store, id).await.is_none());
    }
}
