//! Run state: the authoritative record of one simulation instance

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::config::{Discipline, EngineConfig};
use crate::core::error::{MazeError, Result};
use crate::core::types::{AgentId, Position, RunId, Turn};
use crate::entity::agent::{Agent, AgentSpec, Vitals};
use crate::rules::ruleset::Ruleset;
use crate::simulation::snapshot::TurnSnapshot;
use crate::world::grid::GridWorld;
use crate::world::maze::MazeDefinition;

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    AllAgentsDead,
    ResourcesExhausted,
    WinConditionMet,
    MaxTurnsReached,
    Stopped,
    Failed(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::AllAgentsDead => f.write_str("all agents dead"),
            TerminationReason::ResourcesExhausted => f.write_str("all resources collected"),
            TerminationReason::WinConditionMet => f.write_str("win condition met"),
            TerminationReason::MaxTurnsReached => f.write_str("max turns reached"),
            TerminationReason::Stopped => f.write_str("stopped"),
            TerminationReason::Failed(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Everything needed to create a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub maze: MazeDefinition,
    pub ruleset: Ruleset,
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl RunConfig {
    pub fn new(maze: MazeDefinition, ruleset: Ruleset, agents: Vec<AgentSpec>) -> Self {
        Self {
            maze,
            ruleset,
            agents,
            engine: EngineConfig::default(),
        }
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Final outcome for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: AgentId,
    pub name: String,
    pub final_position: Position,
    pub resources_collected: u32,
    pub total_moves: u32,
    pub turns_survived: u64,
    pub final_vitals: Vitals,
    pub is_winner: bool,
    pub cause_of_death: Option<String>,
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub total_turns: Turn,
    pub duration_ms: u64,
    pub reason: TerminationReason,
    pub agents: Vec<AgentResult>,
    /// Qualifying agent with the most resources; first in agent order on ties
    pub winner: Option<AgentId>,
    pub summary: String,
}

impl RunResults {
    pub fn compute(run: &Run, reason: TerminationReason) -> Self {
        let agents: Vec<AgentResult> = run
            .agents
            .iter()
            .map(|a| AgentResult {
                agent_id: a.id,
                name: a.name.clone(),
                final_position: a.position,
                resources_collected: a.resources_collected,
                total_moves: a.total_moves,
                turns_survived: a.turns_survived,
                final_vitals: a.vitals,
                is_winner: run.ruleset.agent_wins(a),
                cause_of_death: (!a.is_alive).then(|| "health depleted".to_string()),
            })
            .collect();

        let winner = agents
            .iter()
            .filter(|r| r.is_winner)
            .fold(None::<&AgentResult>, |best, r| match best {
                Some(b) if b.resources_collected >= r.resources_collected => Some(b),
                _ => Some(r),
            });

        let summary = match winner {
            Some(w) => format!(
                "Run ended after {} turns ({}). Winner: {} with {} resources.",
                run.turn, reason, w.name, w.resources_collected
            ),
            None => format!("Run ended after {} turns ({}). No winner.", run.turn, reason),
        };

        let duration_ms = match (run.started_at_ms, run.ended_at_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };

        Self {
            total_turns: run.turn,
            duration_ms,
            winner: winner.map(|w| w.agent_id),
            reason,
            agents,
            summary,
        }
    }
}

/// One simulation instance
///
/// Mutated only by the scheduler. Readers get deep copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub grid: GridWorld,
    pub agents: Vec<Agent>,
    pub ruleset: Ruleset,
    pub discipline: Discipline,
    pub status: RunStatus,
    pub turn: Turn,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub history: Vec<TurnSnapshot>,
    pub termination: Option<TerminationReason>,
    pub results: Option<RunResults>,
    /// Bumped on every pause and stop; a commit from an older epoch is dropped
    #[serde(default)]
    pub epoch: u64,
}

impl Run {
    /// Build a run from configuration. Any problem here is fatal and no run
    /// is created.
    pub fn new(config: &RunConfig) -> Result<Self> {
        config.engine.validate()?;
        config.ruleset.validate()?;
        if config.agents.is_empty() {
            return Err(MazeError::config("a run needs at least one agent"));
        }

        let grid = GridWorld::from_definition(&config.maze)?;
        let vitals = Vitals::full(config.ruleset.max_energy, config.ruleset.max_happiness);
        let entries = grid.entry_points();

        let mut agents = Vec::with_capacity(config.agents.len());
        for (i, spec) in config.agents.iter().enumerate() {
            let spawn = match spec.start {
                Some(pos) => {
                    if !grid.is_passable(pos) {
                        return Err(MazeError::config(format!(
                            "agent {} starts on a blocked cell {}",
                            i, pos
                        )));
                    }
                    pos
                }
                None => entries[i % entries.len()],
            };
            if spec.movement_delay_ms == Some(0) {
                return Err(MazeError::config(format!(
                    "agent {}: movement_delay_ms must be positive",
                    i
                )));
            }
            let mut agent = Agent::from_spec(spec, spawn, vitals, config.ruleset.turn_duration_ms);
            agent.id = AgentId::from_seed(config.engine.rng_seed, i as u64);
            if agent.name.trim().is_empty() {
                agent.name = format!("Mouse {}", i + 1);
            }
            agents.push(agent);
        }

        Ok(Self {
            id: RunId::new(),
            grid,
            agents,
            ruleset: config.ruleset.clone(),
            discipline: config.engine.discipline,
            status: RunStatus::Idle,
            turn: 0,
            created_at_ms: now_millis(),
            started_at_ms: None,
            ended_at_ms: None,
            history: Vec::new(),
            termination: None,
            results: None,
            epoch: 0,
        })
    }

    fn reject(&self, action: &'static str) -> MazeError {
        MazeError::InvalidTransition {
            from: self.status.as_str(),
            action,
        }
    }

    /// idle -> running: agents back on their spawn cells, full resource set
    pub fn begin(&mut self) -> Result<()> {
        if self.status != RunStatus::Idle {
            return Err(self.reject("start"));
        }
        let vitals = Vitals::full(self.ruleset.max_energy, self.ruleset.max_happiness);
        for agent in &mut self.agents {
            if !self.grid.is_passable(agent.spawn) {
                return Err(MazeError::config(format!(
                    "agent {} spawn {} is not passable",
                    agent.name, agent.spawn
                )));
            }
            agent.reset(vitals);
        }
        self.grid.restore_resources();
        self.turn = 0;
        self.history.clear();
        self.status = RunStatus::Running;
        self.started_at_ms = Some(now_millis());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(self.reject("pause"));
        }
        self.status = RunStatus::Paused;
        self.epoch += 1;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.status != RunStatus::Paused {
            return Err(self.reject("resume"));
        }
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Any non-terminal state -> completed
    pub fn finish(&mut self, reason: TerminationReason) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.reject("stop"));
        }
        self.status = RunStatus::Completed;
        self.close(reason);
        Ok(())
    }

    /// Any non-terminal state -> error
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RunStatus::Error;
        self.close(TerminationReason::Failed(message.into()));
    }

    fn close(&mut self, reason: TerminationReason) {
        self.epoch += 1;
        self.ended_at_ms = Some(now_millis());
        self.results = Some(RunResults::compute(self, reason.clone()));
        self.termination = Some(reason);
    }

    pub fn agent_index(&self, id: AgentId) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_alive).count()
    }

    pub fn last_snapshot(&self) -> Option<&TurnSnapshot> {
        self.history.last()
    }

    /// ASCII picture of the grid with agent markers
    pub fn render(&self) -> String {
        let markers: Vec<(Position, char)> = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.position, a.marker(i + 1)))
            .collect();
        self.grid.render(&markers)
    }
}
