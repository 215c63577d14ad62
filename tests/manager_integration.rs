//! Integration tests for the run manager, persistence and export
//!
//! Full runs driven through the manager with a store attached, reloaded
//! from disk, shared, and exported as CSV.

use std::sync::Arc;

use cheese_maze::core::config::EngineConfig;
use cheese_maze::core::types::{Direction, RunId};
use cheese_maze::decision::provider::{DecisionProvider, StrategyRouter};
use cheese_maze::decision::strategies::{LocalStrategyProvider, StrategyKind};
use cheese_maze::entity::agent::AgentSpec;
use cheese_maze::persistence::{InMemoryRunStore, JsonFileRunStore, RunStore};
use cheese_maze::rules::loader::{parse_rulesets_toml, RulesetCatalog};
use cheese_maze::rules::ruleset::{RulesetMode, WinConditionKind};
use cheese_maze::simulation::export::{write_csv, CSV_HEADER};
use cheese_maze::simulation::manager::RunManager;
use cheese_maze::simulation::run::{RunConfig, RunStatus, TerminationReason};
use cheese_maze::simulation::scheduler::StepOutcome;
use cheese_maze::world::maze::MazeDefinition;

// ============================================================================
// Helpers
// ============================================================================

fn greedy() -> Arc<dyn DecisionProvider> {
    Arc::new(LocalStrategyProvider::new(StrategyKind::Greedy, 11))
}

fn two_cheese_config() -> RunConfig {
    let maze = MazeDefinition::new(
        "pair",
        "Pair",
        &["#######", "#S..C.#", "#.....#", "#C...S#", "#######"],
    );
    let engine = EngineConfig {
        persist_every_turns: 1,
        ..Default::default()
    };
    RunConfig::new(
        maze,
        RulesetCatalog::predefined().unwrap().require("classic").unwrap(),
        vec![AgentSpec::named("Remy"), AgentSpec::named("Emile")],
    )
    .with_engine(engine)
}

/// Step a run until it ends; panics if it never does
async fn run_to_end(manager: &RunManager, config: &RunConfig) -> RunId {
    let id = manager.create(config).unwrap();
    let scheduler = manager.get(id).unwrap();
    scheduler.start_stepped().await.unwrap();
    for _ in 0..100 {
        if let StepOutcome::Finished(_) = scheduler.step().await.unwrap() {
            scheduler.flush().await;
            return id;
        }
    }
    panic!("run {} did not finish", id);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_finished_run_is_saved_and_reloaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileRunStore::open(dir.path()).await.unwrap());
    let manager = RunManager::new(greedy(), &EngineConfig::default()).with_store(store.clone());

    let config = two_cheese_config();
    let id = run_to_end(&manager, &config).await;
    let live = manager.state(id).await.unwrap();
    assert_eq!(live.status, RunStatus::Completed);
    assert_eq!(live.termination, Some(TerminationReason::ResourcesExhausted));

    // a fresh store over the same directory sees the final state
    let reopened = JsonFileRunStore::open(dir.path()).await.unwrap();
    let stored = reopened.load(id).await.unwrap().expect("run was saved");
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.turn, live.turn);
    assert_eq!(stored.history, live.history);
    assert_eq!(stored.results, live.results);
    assert_eq!(reopened.list().await.unwrap(), vec![id]);
}

#[tokio::test]
async fn test_manager_falls_back_to_store_after_removal() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunManager::new(greedy(), &EngineConfig::default()).with_store(store.clone());

    let id = run_to_end(&manager, &two_cheese_config()).await;
    manager.remove(id).await.unwrap();
    assert!(manager.get(id).is_err());

    let loaded = manager.load(id).await.expect("store still has the run");
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.status, RunStatus::Completed);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_stopped_run_is_saved() {
    let store = Arc::new(InMemoryRunStore::new());
    let manager = RunManager::new(greedy(), &EngineConfig::default()).with_store(store.clone());

    let id = manager.create(&two_cheese_config()).unwrap();
    let scheduler = manager.get(id).unwrap();
    scheduler.start_stepped().await.unwrap();
    scheduler.step().await.unwrap();
    manager.stop(id).await.unwrap();
    scheduler.flush().await;

    let stored = store.load(id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.termination, Some(TerminationReason::Stopped));
    assert_eq!(stored.turn, 1);
}

#[tokio::test]
async fn test_unknown_run_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileRunStore::open(dir.path()).await.unwrap());
    let manager = RunManager::new(greedy(), &EngineConfig::default()).with_store(store);
    assert!(manager.load(RunId::new()).await.is_none());
}

// ============================================================================
// Shares
// ============================================================================

#[tokio::test]
async fn test_share_link_shows_finished_run() {
    let manager = RunManager::new(greedy(), &EngineConfig::default());
    let id = run_to_end(&manager, &two_cheese_config()).await;

    let link = manager.create_share(id, Some(std::time::Duration::from_secs(60))).unwrap();
    assert_eq!(link.token.len(), 32);
    let viewed = manager.resolve_share(&link.token).await.unwrap();
    assert_eq!(viewed.status, RunStatus::Completed);
    assert_eq!(manager.share(&link.token).unwrap().view_count, 1);

    let expired = manager.create_share(id, Some(std::time::Duration::ZERO)).unwrap();
    assert!(manager.resolve_share(&expired.token).await.is_none());
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_csv_export_has_one_row_per_agent_per_turn() {
    let manager = RunManager::new(greedy(), &EngineConfig::default());
    let id = run_to_end(&manager, &two_cheese_config()).await;
    let run = manager.state(id).await.unwrap();

    let mut out = Vec::new();
    let rows = write_csv(run.export_rows(), &mut out).unwrap();
    assert_eq!(rows, run.history.len() * run.agents.len());

    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    assert_eq!(lines.count(), rows);

    let summary = run.summary();
    assert_eq!(summary.total_turns, run.turn);
    assert_eq!(summary.resources_remaining, 0);
    let total: u32 = summary.per_agent.iter().map(|a| a.resources_collected).sum();
    assert_eq!(total, 2);
    assert!(summary.to_json().unwrap().contains("\"perAgent\""));
}

// ============================================================================
// Rulesets and strategies end to end
// ============================================================================

#[tokio::test]
async fn test_custom_ruleset_file_drives_a_run() {
    let catalog = parse_rulesets_toml(
        r#"
[[ruleset]]
name = "Quick Win"
turn_duration_ms = 100
mode = "lethal"

[[ruleset.win_conditions]]
type = "cheese_count"
value = 1
"#,
    )
    .unwrap();
    let rules = catalog.require("quick-win").unwrap();
    assert_eq!(rules.mode, RulesetMode::AttritionLethal);
    assert_eq!(rules.win_conditions[0].kind, WinConditionKind::ResourceCount);

    let manager = RunManager::new(greedy(), &EngineConfig::default());
    let maze = MazeDefinition::new("two", "Two", &["########", "#S..C.C#", "########"]);
    let config = RunConfig::new(maze, rules, vec![AgentSpec::named("Remy")]);
    let id = run_to_end(&manager, &config).await;
    let run = manager.state(id).await.unwrap();

    let results = run.results.unwrap();
    assert_eq!(results.reason, TerminationReason::WinConditionMet);
    assert_eq!(results.winner, Some(run.agents[0].id));
}

#[tokio::test]
async fn test_router_sends_agents_to_their_strategy() {
    let router = StrategyRouter::new(Arc::new(LocalStrategyProvider::new(StrategyKind::Random, 5)))
        .route("greedy", greedy());
    let manager = RunManager::new(Arc::new(router), &EngineConfig::default());

    let maze = MazeDefinition::new("line", "Line", &["#######", "#S...C#", "#######"]);
    let config = RunConfig::new(
        maze,
        RulesetCatalog::predefined().unwrap().require("classic").unwrap(),
        vec![AgentSpec::named("Remy").with_strategy("greedy")],
    );
    let id = run_to_end(&manager, &config).await;
    let run = manager.state(id).await.unwrap();

    // greedy walks straight to the cheese
    assert_eq!(run.turn, 4);
    assert!(run.history.iter().all(|s| !s.events.iter().any(|e| e.contains(&Direction::West.to_string()))));
}
