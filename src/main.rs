//! Cheese Maze - command line runner
//!
//! Builds a run from a maze, a ruleset and a list of agents, drives it to
//! completion (or until Ctrl-C), then prints the results.

use cheese_maze::core::config::{Discipline, EngineConfig};
use cheese_maze::core::error::Result;
use cheese_maze::decision::client::HttpDecisionProvider;
use cheese_maze::decision::provider::{DecisionProvider, StrategyRouter};
use cheese_maze::decision::strategies::{LocalStrategyProvider, StrategyKind};
use cheese_maze::entity::agent::AgentSpec;
use cheese_maze::persistence::JsonFileRunStore;
use cheese_maze::rules::loader::{load_rulesets, RulesetCatalog};
use cheese_maze::simulation::events::RunEvent;
use cheese_maze::simulation::export::write_csv;
use cheese_maze::simulation::manager::RunManager;
use cheese_maze::simulation::run::RunConfig;
use cheese_maze::world::loader::resolve_maze;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Cheese Maze - mice looking for cheese under a configurable rule engine
#[derive(Parser, Debug)]
#[command(name = "cheese-maze")]
#[command(about = "Run a maze simulation of decision-driven agents")]
struct Args {
    /// Built-in maze (simple, complex, social) or path to a .toml/.json maze
    #[arg(long, default_value = "simple")]
    maze: String,

    /// Ruleset id or name
    #[arg(long, default_value = "classic")]
    ruleset: String,

    /// Extra ruleset file merged over the predefined ones
    #[arg(long)]
    rulesets: Option<PathBuf>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent as NAME or NAME:STRATEGY; repeat for more agents
    #[arg(long = "agent", value_name = "NAME[:STRATEGY]")]
    agents: Vec<String>,

    /// Strategy for agents that do not name one, when no decision URL is set
    #[arg(long, default_value = "greedy")]
    strategy: StrategyKind,

    /// lockstep or per-agent
    #[arg(long)]
    discipline: Option<Discipline>,

    /// External decision service endpoint
    #[arg(long)]
    decision_url: Option<String>,

    /// Decision timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Override the ruleset's turn duration in milliseconds
    #[arg(long)]
    turn_ms: Option<u64>,

    /// Random seed for fallbacks and local strategies
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many turns
    #[arg(long)]
    max_turns: Option<u64>,

    /// Write per-turn rows to this CSV file
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Persist runs as JSON files under this directory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Print every turn's events
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn parse_agent(raw: &str) -> Result<AgentSpec> {
    match raw.split_once(':') {
        Some((name, strategy)) => {
            let kind: StrategyKind = strategy.parse()?;
            Ok(AgentSpec::named(name.trim()).with_strategy(kind.as_str()))
        }
        None => Ok(AgentSpec::named(raw.trim())),
    }
}

fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(discipline) = args.discipline {
        config.discipline = discipline;
    }
    if let Some(url) = &args.decision_url {
        config.decision_url = Some(url.clone());
    }
    if let Some(timeout) = args.timeout_ms {
        config.decision_timeout_ms = timeout;
    }
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    if args.max_turns.is_some() {
        config.max_turns = args.max_turns;
    }
    config.validate()?;
    Ok(config)
}

fn decision_provider(args: &Args, config: &EngineConfig) -> Result<Arc<dyn DecisionProvider>> {
    let default: Arc<dyn DecisionProvider> = match HttpDecisionProvider::from_config(config)? {
        Some(http) => {
            tracing::info!(url = http.url(), "Using external decision service");
            Arc::new(http)
        }
        None => Arc::new(LocalStrategyProvider::new(args.strategy, config.rng_seed)),
    };

    let mut router = StrategyRouter::new(default);
    for kind in StrategyKind::ALL {
        router = router.route(kind.as_str(), Arc::new(LocalStrategyProvider::new(kind, config.rng_seed)));
    }
    Ok(Arc::new(router))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cheese_maze=info")),
        )
        .init();

    let args = Args::parse();
    let engine = engine_config(&args)?;

    let maze = resolve_maze(&args.maze)?;
    let mut catalog = RulesetCatalog::predefined()?;
    if let Some(path) = &args.rulesets {
        catalog.merge(load_rulesets(path)?);
    }
    let mut ruleset = catalog.require(&args.ruleset)?;
    if let Some(turn_ms) = args.turn_ms {
        ruleset.turn_duration_ms = turn_ms;
    }

    let mut agents = args
        .agents
        .iter()
        .map(|raw| parse_agent(raw))
        .collect::<Result<Vec<_>>>()?;
    if agents.is_empty() {
        agents.push(AgentSpec::default());
    }

    let provider = decision_provider(&args, &engine)?;
    let mut manager = RunManager::new(provider, &engine);
    if let Some(dir) = &args.store_dir {
        let store = JsonFileRunStore::open(dir.clone()).await?;
        manager = manager.with_store(Arc::new(store));
    }

    let config = RunConfig::new(maze, ruleset, agents).with_engine(engine);
    let id = manager.create(&config)?;
    let scheduler = manager.get(id)?;

    let mut events = scheduler.subscribe();
    let verbose = args.verbose;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RunEvent::TurnCommitted { turn, snapshot, .. }) => {
                    if verbose {
                        for line in &snapshot.events {
                            println!("[turn {:>4}] {}", turn, line);
                        }
                    }
                }
                Ok(RunEvent::Finished { .. }) => break,
                Ok(RunEvent::StatusChanged { status, .. }) => {
                    tracing::debug!(%status, "Status changed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let initial = scheduler.current_state().await;
    println!("\n=== CHEESE MAZE ===");
    println!(
        "Maze: {} ({}x{}), ruleset: {}, agents: {}",
        initial.grid.maze_name(),
        initial.grid.width(),
        initial.grid.height(),
        initial.ruleset.name,
        initial.agents.len()
    );
    println!("{}", initial.render());

    scheduler.start().await?;

    tokio::select! {
        status = scheduler.wait_finished() => {
            tracing::info!(%status, "Run reached a terminal state");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping run");
            scheduler.stop().await?;
        }
    }
    scheduler.flush().await;
    if let Err(err) = printer.await {
        tracing::warn!(error = %err, "Event printer ended abnormally");
    }

    let run = scheduler.current_state().await;
    println!("{}", run.render());
    if let Some(results) = &run.results {
        println!("{}", results.summary);
    }
    println!("{}", run.summary().summary());
    println!("Decision fallbacks: {}", scheduler.gateway().fallback_count());

    if let Some(path) = &args.export_csv {
        let file = std::fs::File::create(path)?;
        let rows = write_csv(run.export_rows(), std::io::BufWriter::new(file))?;
        println!("Wrote {} rows to {}", rows, path.display());
    }

    Ok(())
}
