//! Run manager: the registry of live runs
//!
//! Owns id -> scheduler, hands out share tokens, and drops finished runs once
//! they outlive the configured TTL. Lookups that miss in memory fall through
//! to the store when one is attached.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::core::config::EngineConfig;
use crate::core::error::{MazeError, Result};
use crate::core::types::RunId;
use crate::decision::gateway::DecisionGateway;
use crate::decision::provider::DecisionProvider;
use crate::persistence::{load_or_none, RunStore};
use crate::simulation::run::{now_millis, Run, RunConfig};
use crate::simulation::scheduler::Scheduler;

/// Read-only link to a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub token: String,
    pub run_id: RunId,
    pub created_at_ms: u64,
    pub expires_at_ms: Option<u64>,
    pub view_count: u64,
    pub is_active: bool,
}

impl ShareLink {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(at) if now_ms >= at)
    }
}

pub struct RunManager {
    runs: RwLock<AHashMap<RunId, Arc<Scheduler>>>,
    shares: RwLock<AHashMap<String, ShareLink>>,
    provider: Arc<dyn DecisionProvider>,
    store: Option<Arc<dyn RunStore>>,
    ttl: Duration,
}

impl RunManager {
    pub fn new(provider: Arc<dyn DecisionProvider>, config: &EngineConfig) -> Self {
        Self {
            runs: RwLock::new(AHashMap::new()),
            shares: RwLock::new(AHashMap::new()),
            provider,
            store: None,
            ttl: config.run_ttl(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn runs_read(&self) -> std::sync::RwLockReadGuard<'_, AHashMap<RunId, Arc<Scheduler>>> {
        self.runs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn runs_write(&self) -> std::sync::RwLockWriteGuard<'_, AHashMap<RunId, Arc<Scheduler>>> {
        self.runs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shares_write(&self) -> std::sync::RwLockWriteGuard<'_, AHashMap<String, ShareLink>> {
        self.shares.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate configuration and register an idle run. Configuration errors
    /// are returned and nothing is registered.
    pub fn create(&self, config: &RunConfig) -> Result<RunId> {
        let run = Run::new(config)?;
        let gateway = DecisionGateway::new(
            Arc::clone(&self.provider),
            config.engine.decision_timeout(),
            config.engine.rng_seed,
        );
        let id = run.id;
        let scheduler = match &self.store {
            Some(store) => Scheduler::with_store(run, gateway, config.engine.clone(), Arc::clone(store)),
            None => Scheduler::new(run, gateway, config.engine.clone()),
        };
        self.runs_write().insert(id, Arc::new(scheduler));
        tracing::info!(run_id = %id, maze = %config.maze.id, ruleset = %config.ruleset.name, "Run created");
        Ok(id)
    }

    pub fn get(&self, id: RunId) -> Result<Arc<Scheduler>> {
        self.runs_read()
            .get(&id)
            .cloned()
            .ok_or(MazeError::RunNotFound(id))
    }

    pub fn ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs_read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.runs_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs_read().is_empty()
    }

    pub async fn start(&self, id: RunId) -> Result<()> {
        self.get(id)?.start().await
    }

    pub async fn pause(&self, id: RunId) -> Result<()> {
        self.get(id)?.pause().await
    }

    pub async fn resume(&self, id: RunId) -> Result<()> {
        self.get(id)?.resume().await
    }

    pub async fn stop(&self, id: RunId) -> Result<()> {
        self.get(id)?.stop().await
    }

    /// Deep copy of a live run
    pub async fn state(&self, id: RunId) -> Result<Run> {
        Ok(self.get(id)?.current_state().await)
    }

    /// Live run if registered, else whatever the store has
    pub async fn load(&self, id: RunId) -> Option<Run> {
        if let Ok(scheduler) = self.get(id) {
            return Some(scheduler.current_state().await);
        }
        match &self.store {
            Some(store) => load_or_none(store.as_ref(), id).await,
            None => None,
        }
    }

    /// Unregister a run, stopping it first if it is still live
    pub async fn remove(&self, id: RunId) -> Result<()> {
        let scheduler = self.runs_write().remove(&id).ok_or(MazeError::RunNotFound(id))?;
        if !scheduler.status().is_terminal() {
            scheduler.stop().await?;
        }
        self.shares_write().retain(|_, link| link.run_id != id);
        tracing::info!(run_id = %id, "Run removed");
        Ok(())
    }

    /// Drop finished runs that ended more than the TTL ago
    pub async fn purge_expired(&self) -> usize {
        let now = now_millis();
        let ttl_ms = self.ttl.as_millis() as u64;
        let candidates: Vec<(RunId, Arc<Scheduler>)> = self
            .runs_read()
            .iter()
            .filter(|(_, s)| s.status().is_terminal())
            .map(|(id, s)| (*id, Arc::clone(s)))
            .collect();

        let mut expired = Vec::new();
        for (id, scheduler) in candidates {
            let run = scheduler.current_state().await;
            if let Some(ended) = run.ended_at_ms {
                if now.saturating_sub(ended) >= ttl_ms {
                    expired.push(id);
                }
            }
        }

        if !expired.is_empty() {
            let mut runs = self.runs_write();
            for id in &expired {
                runs.remove(id);
            }
        }
        if !expired.is_empty() {
            self.shares_write().retain(|_, link| !expired.contains(&link.run_id));
            tracing::info!(count = expired.len(), "Purged expired runs");
        }
        expired.len()
    }

    /// Issue a share token for a run, optionally expiring after `ttl`
    pub fn create_share(&self, id: RunId, ttl: Option<Duration>) -> Result<ShareLink> {
        self.get(id)?;
        let now = now_millis();
        let link = ShareLink {
            token: Uuid::new_v4().simple().to_string(),
            run_id: id,
            created_at_ms: now,
            expires_at_ms: ttl.map(|t| now + t.as_millis() as u64),
            view_count: 0,
            is_active: true,
        };
        self.shares_write().insert(link.token.clone(), link.clone());
        Ok(link)
    }

    pub fn deactivate_share(&self, token: &str) -> bool {
        match self.shares_write().get_mut(token) {
            Some(link) => {
                link.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn share(&self, token: &str) -> Option<ShareLink> {
        self.shares
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(token)
            .cloned()
    }

    /// Resolve a share token to a read-only copy of its run. Counts the view.
    /// Unknown, expired or deactivated tokens resolve to nothing.
    pub async fn resolve_share(&self, token: &str) -> Option<Run> {
        let run_id = {
            let mut shares = self.shares_write();
            let link = shares.get_mut(token)?;
            if !link.is_active || link.is_expired(now_millis()) {
                return None;
            }
            link.view_count += 1;
            link.run_id
        };
        self.load(run_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::strategies::{LocalStrategyProvider, StrategyKind};
    use crate::entity::agent::AgentSpec;
    use crate::rules::ruleset::Ruleset;
    use crate::simulation::run::RunStatus;
    use crate::world::maze::MazeDefinition;

    fn manager(ttl_secs: u64) -> RunManager {
        let config = EngineConfig {
            run_ttl_secs: ttl_secs,
            ..Default::default()
        };
        RunManager::new(Arc::new(LocalStrategyProvider::new(StrategyKind::Greedy, 1)), &config)
    }

    fn config() -> RunConfig {
        let maze = MazeDefinition::new("t", "Test", &["#####", "#S.C#", "#####"]);
        RunConfig::new(maze, Ruleset::default(), vec![AgentSpec::named("a")])
    }

    #[tokio::test]
    async fn test_create_rejects_bad_config() {
        let m = manager(60);
        let mut bad = config();
        bad.agents.clear();
        assert!(m.create(&bad).unwrap_err().is_fatal());
        assert!(m.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_through_manager() {
        let m = manager(60);
        let id = m.create(&config()).unwrap();
        assert_eq!(m.state(id).await.unwrap().status, RunStatus::Idle);
        m.get(id).unwrap().start_stepped().await.unwrap();
        m.pause(id).await.unwrap();
        assert!(m.pause(id).await.is_err());
        m.resume(id).await.unwrap();
        m.stop(id).await.unwrap();
        assert_eq!(m.state(id).await.unwrap().status, RunStatus::Completed);
        assert!(matches!(m.start(RunId::new()).await, Err(MazeError::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_purge_only_finished_past_ttl() {
        let m = manager(0);
        let live = m.create(&config()).unwrap();
        let done = m.create(&config()).unwrap();
        m.get(done).unwrap().start_stepped().await.unwrap();
        m.stop(done).await.unwrap();

        assert_eq!(m.purge_expired().await, 1);
        assert_eq!(m.ids(), vec![live]);

        let long = manager(3_600);
        let id = long.create(&config()).unwrap();
        long.get(id).unwrap().start_stepped().await.unwrap();
        long.stop(id).await.unwrap();
        assert_eq!(long.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_remove_stops_live_run() {
        let m = manager(60);
        let id = m.create(&config()).unwrap();
        let scheduler = m.get(id).unwrap();
        scheduler.start_stepped().await.unwrap();
        m.remove(id).await.unwrap();
        assert_eq!(scheduler.status(), RunStatus::Completed);
        assert!(m.get(id).is_err());
        assert!(m.remove(id).await.is_err());
    }

    #[tokio::test]
    async fn test_share_links() {
        let m = manager(60);
        let id = m.create(&config()).unwrap();
        let link = m.create_share(id, None).unwrap();

        assert_eq!(m.resolve_share(&link.token).await.unwrap().id, id);
        assert_eq!(m.resolve_share(&link.token).await.unwrap().id, id);
        assert_eq!(m.share(&link.token).unwrap().view_count, 2);

        assert!(m.deactivate_share(&link.token));
        assert!(m.resolve_share(&link.token).await.is_none());
        assert!(m.resolve_share("no-such-token").await.is_none());

        let expired = m.create_share(id, Some(Duration::ZERO)).unwrap();
        assert!(m.resolve_share(&expired.token).await.is_none());
        assert_eq!(m.share(&expired.token).unwrap().view_count, 0);

        assert!(m.create_share(RunId::new(), None).is_err());
    }
}
